//! Self-contained type definitions for the ChatGPT data export (`conversations.json`).
//!
//! The export is a JSON array of conversations. Each conversation carries a `mapping`
//! object whose values are tree nodes keyed by an opaque id:
//!
//! ```json
//! {
//!   "title": "Rust lifetimes",
//!   "mapping": {
//!     "aaa-111": { "message": null, "parent": null, "children": ["bbb-222"] },
//!     "bbb-222": {
//!       "message": {
//!         "author": { "role": "user", "name": null },
//!         "create_time": 1700000000.123,
//!         "content": { "content_type": "text", "parts": ["Hello"] }
//!       },
//!       "parent": "aaa-111",
//!       "children": []
//!     }
//!   }
//! }
//! ```
//!
//! Ordering is derived from `create_time` alone; `parent`/`children` links are not followed.
use std::fs;
use std::path::Path;

use eyre::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("conversation entry is not an object: {0}")]
    NotARecord(String),
    #[error("message content has none of `parts`, `text` or `result`")]
    MalformedContent,
}

/// Read the export file and return its top-level entries, unparsed.
///
/// Entries are validated one by one later so that a single odd entry does not sink the run.
pub fn load_archive(path: &Path) -> Result<Vec<Value>> {
    let raw = fs::read(path).wrap_err_with(|| format!("Failed to read: {}", path.display()))?;
    serde_json::from_slice::<Vec<Value>>(&raw)
        .wrap_err_with(|| format!("Expected a JSON array of conversations in {}", path.display()))
}

// ---------------------------------------------------------------------------
// Author
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
    Other,
}

impl Role {
    fn from_export(value: Option<&str>) -> Role {
        match value {
            Some("user") => Role::User,
            Some("assistant") => Role::Assistant,
            Some("system") => Role::System,
            Some("tool") => Role::Tool,
            _ => Role::Other,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Author {
    #[serde(default)]
    role: Option<String>,
    /// Tool name for `tool` messages, e.g. `dalle.text2im`.
    #[serde(default)]
    pub name: Option<String>,
}

impl Author {
    pub fn role(&self) -> Role {
        Role::from_export(self.role.as_deref())
    }

    /// Images produced by the DALL·E tool live in a separate folder of the export.
    pub fn is_dalle(&self) -> bool {
        self.role() == Role::Tool && self.name.as_deref() == Some("dalle.text2im")
    }
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

/// Raw `content` object. Exactly one of the three payload keys is expected.
#[derive(Debug, Clone, Default, Deserialize)]
struct RawContent {
    #[serde(default)]
    parts: Option<Vec<Value>>,
    #[serde(default)]
    text: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
}

/// An image referenced by a message, stored next to the export as a separate file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePointer {
    /// `file-service://file-<id>` or `sediment://file_<id>`.
    pub asset_pointer: String,
    /// Generation prompt from `metadata.dalle.prompt`, if any.
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    Image(ImagePointer),
    /// Any other structured part. Contributes its `text` field when it has one.
    Structured(Option<String>),
}

impl ContentPart {
    fn from_value(value: Value) -> Option<ContentPart> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(ContentPart::Text(s)),
            Value::Object(map) => {
                if map.get("content_type").and_then(Value::as_str) == Some("image_asset_pointer") {
                    let asset_pointer = map
                        .get("asset_pointer")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    let prompt = map
                        .get("metadata")
                        .and_then(|m| m.get("dalle"))
                        .and_then(|d| d.get("prompt"))
                        .and_then(Value::as_str)
                        .filter(|p| !p.is_empty())
                        .map(str::to_string);
                    Some(ContentPart::Image(ImagePointer {
                        asset_pointer,
                        prompt,
                    }))
                } else {
                    Some(ContentPart::Structured(
                        map.get("text").map(scalar_to_text),
                    ))
                }
            }
            other => Some(ContentPart::Text(other.to_string())),
        }
    }

    /// The textual payload of this part, if it carries one.
    pub fn text(&self) -> Option<&str> {
        match self {
            ContentPart::Text(text) => Some(text),
            ContentPart::Structured(text) => text.as_deref(),
            ContentPart::Image(_) => None,
        }
    }
}

fn scalar_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Message / Conversation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub author: Author,
    #[serde(default)]
    create_time: Option<f64>,
    #[serde(default)]
    content: Option<RawContent>,
}

impl Message {
    /// Creation time in seconds since the epoch. A zero timestamp counts as missing.
    pub fn create_time(&self) -> Option<f64> {
        self.create_time.filter(|t| *t != 0.0)
    }

    fn sort_key(&self) -> f64 {
        self.create_time().unwrap_or(f64::NEG_INFINITY)
    }

    /// Resolve the content union into an ordered list of parts.
    pub fn content_parts(&self) -> Result<Vec<ContentPart>, ArchiveError> {
        let content = self.content.as_ref().ok_or(ArchiveError::MalformedContent)?;
        if let Some(parts) = &content.parts {
            Ok(parts
                .iter()
                .cloned()
                .filter_map(ContentPart::from_value)
                .collect())
        } else if let Some(text) = &content.text {
            Ok(vec![ContentPart::Text(scalar_to_text(text))])
        } else if let Some(result) = &content.result {
            Ok(vec![ContentPart::Text(scalar_to_text(result))])
        } else {
            Err(ArchiveError::MalformedContent)
        }
    }
}

#[derive(Debug, Clone)]
pub struct Conversation {
    pub title: Option<String>,
    /// Messages in ascending `create_time` order, untimed messages first.
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Parse one archive entry and linearize its node mapping.
    ///
    /// Nodes without an object-typed `message`, or whose message cannot be read, are dropped.
    /// The sort is stable, so equal timestamps keep the mapping's source order.
    pub fn from_value(value: Value) -> Result<Conversation, ArchiveError> {
        let mut entry = match value {
            Value::Object(entry) => entry,
            other => return Err(ArchiveError::NotARecord(preview(&other))),
        };

        let title = entry
            .get("title")
            .and_then(Value::as_str)
            .map(str::to_string);

        let mut messages = Vec::new();
        if let Some(Value::Object(mapping)) = entry.remove("mapping") {
            for (node_id, mut node) in mapping {
                let Some(message) = node.get_mut("message").map(Value::take) else {
                    continue;
                };
                if !message.is_object() {
                    continue;
                }
                match serde_json::from_value::<Message>(message) {
                    Ok(m) => messages.push(m),
                    Err(e) => tracing::warn!(node = %node_id, "Skipping unreadable message: {}", e),
                }
            }
        }

        messages.sort_by(|a, b| a.sort_key().total_cmp(&b.sort_key()));

        Ok(Conversation { title, messages })
    }

    /// The earliest message that carries a timestamp.
    pub fn first_timestamp(&self) -> Option<f64> {
        self.messages.iter().find_map(Message::create_time)
    }
}

fn preview(value: &Value) -> String {
    let mut text = value.to_string();
    if text.len() > 80 {
        let cut = (0..=80).rev().find(|i| text.is_char_boundary(*i)).unwrap_or(0);
        text.truncate(cut);
        text.push_str("...");
    }
    text
}
