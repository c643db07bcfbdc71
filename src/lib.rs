//! # chatgpt-export-md
//!
//! Converts a ChatGPT data export into one Markdown file per conversation.
//!
//! ## What it does
//!
//! The export's `conversations.json` stores every conversation as a mapping of tree nodes.
//! Each conversation's messages are pulled out of that mapping, ordered by creation time,
//! and written to `<title>.md` (optionally prefixed with the conversation date). Images
//! referenced by messages are copied from the export folder next to the Markdown file as
//! `<title>_image_<n>.<ext>`.
//!
//! Formatting is driven by a settings file: author names, timestamps, LaTeX delimiter
//! rewriting (`\(x\)` → `$x$`), `<details>` collapsing of long messages and Obsidian
//! front matter.
//!
//! ## Usage
//!
//! ```sh
//! # Convert ./chatgptexport into ./output using ./config.json if present
//! chatgpt-export-md
//!
//! # Explicit folders and settings
//! chatgpt-export-md ~/Downloads/chatgpt-export --output ~/notes/chatgpt --config settings.toml
//! ```
//!
//! The input is only read; conversations are written one at a time in archive order.
pub mod assets;
pub mod config;
pub mod importer;
pub mod renderer;
pub mod sequential;
pub mod utils;
