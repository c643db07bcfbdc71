use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use eyre::{Result, eyre};
use std::path::PathBuf;

/// Configuration required to run the conversion.
/// This decouples the logic from how the options were gathered (CLI/Config file).
#[derive(Clone, Debug)]
pub struct ExportConfig {
    /// Folder holding `conversations.json` and the exported image files.
    pub input_dir: PathBuf,
    pub target_dir: PathBuf,
    pub user_name: String,
    pub assistant_name: String,
    pub date_format: String,
    pub time_format: String,
    pub include_timestamps: bool,
    pub prefix_date_in_filename: bool,
    pub convert_latex: bool,
    pub message_separator: String,
    pub skip_empty_messages: bool,
    pub collapse_long_messages: bool,
    pub long_message_line_threshold: usize,
    pub collapse_open_by_default: bool,
    pub front_matter: bool,
    pub quiet: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("chatgptexport"),
            target_dir: PathBuf::from("output"),
            user_name: "Me".to_string(),
            assistant_name: "ChatGPT".to_string(),
            date_format: "%Y-%m-%d".to_string(),
            time_format: "%H:%M".to_string(),
            include_timestamps: true,
            prefix_date_in_filename: true,
            convert_latex: true,
            message_separator: "\n\n---\n\n".to_string(),
            skip_empty_messages: true,
            collapse_long_messages: true,
            long_message_line_threshold: 5,
            collapse_open_by_default: false,
            front_matter: true,
            quiet: false,
        }
    }
}

impl ExportConfig {
    /// Reject format strings chrono would panic on while rendering.
    pub fn validate(&self) -> Result<()> {
        for (key, fmt) in [
            ("date_format", &self.date_format),
            ("time_format", &self.time_format),
        ] {
            if StrftimeItems::new(fmt).any(|item| matches!(item, Item::Error)) {
                return Err(eyre!("Invalid {}: {:?}", key, fmt));
            }
        }
        Ok(())
    }

    pub fn archive_path(&self) -> PathBuf {
        self.input_dir.join("conversations.json")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessResult {
    Written,
    Skipped,
}

/// Keep alphanumerics, spaces and underscores, trim the end, then turn spaces into underscores.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '_')
        .collect::<String>()
        .trim_end()
        .replace(' ', "_")
}

/// Render an export timestamp (fractional epoch seconds) in the local time zone.
pub fn format_timestamp(ts: f64, fmt: &str) -> Option<String> {
    let secs = ts.floor();
    let nanos = ((ts - secs) * 1e9) as u32;
    let utc = DateTime::from_timestamp(secs as i64, nanos.min(999_999_999))?;
    Some(utc.with_timezone(&Local).format(fmt).to_string())
}
