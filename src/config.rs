//! Settings file discovery and merging.
//!
//! The settings file keeps the key names of the historical `config.json` written by the
//! settings editor (`user_name`, `LLM_name`, ...). JSON and TOML are both accepted; the
//! format is picked from the file extension.

use crate::utils::ExportConfig;
use eyre::{Context, Result, eyre};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Deserialize, Default, Debug)]
#[serde(default)]
pub struct FileConfig {
    pub user_name: Option<String>,
    #[serde(rename = "LLM_name")]
    pub llm_name: Option<String>,
    pub input_directory: Option<PathBuf>,
    pub output_directory: Option<PathBuf>,
    pub date_format: Option<String>,
    pub time_format: Option<String>,
    pub include_timestamps: Option<bool>,
    pub prefix_date_in_filename: Option<bool>,
    pub convert_latex_syntax: Option<bool>,
    pub message_separator: Option<String>,
    pub skip_empty_messages: Option<bool>,
    pub collapse_long_messages: Option<bool>,
    pub long_message_line_threshold: Option<usize>,
    pub collapse_open_by_default: Option<bool>,
    pub obsidian_front_matter: Option<bool>,
}

/// Options that only come from the command line.
#[derive(Default, Debug)]
pub struct CliOverrides {
    pub input_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub quiet: bool,
}

fn parse_file_config(path: &Path, content: &str) -> Result<FileConfig> {
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(content)
            .wrap_err_with(|| format!("Failed to parse config: {}", path.display()))
    } else {
        toml::from_str(content)
            .wrap_err_with(|| format!("Failed to parse config: {}", path.display()))
    }
}

/// Locate and parse the settings file.
///
/// Search order: the explicit path, `./config.json`, then
/// `$XDG_CONFIG_HOME/chatgpt-export-md/config.toml`. No file at all means defaults.
pub fn load_file_config(explicit_path: Option<&Path>) -> Result<FileConfig> {
    let path = if let Some(p) = explicit_path {
        if !p.exists() {
            return Err(eyre!("Config file not found: {}", p.display()));
        }
        Some(p.to_path_buf())
    } else {
        Some(PathBuf::from("config.json"))
            .filter(|p| p.exists())
            .or_else(|| {
                dirs::config_dir()
                    .map(|d| d.join("chatgpt-export-md/config.toml"))
                    .filter(|p| p.exists())
            })
    };

    match path {
        None => Ok(FileConfig::default()),
        Some(p) => {
            let content = fs::read_to_string(&p)
                .wrap_err_with(|| format!("Failed to read config: {}", p.display()))?;
            tracing::debug!(path = %p.display(), "Loaded config file");
            parse_file_config(&p, &content)
        }
    }
}

/// Merge CLI > config file > defaults and validate the result.
pub fn resolve(file_cfg: FileConfig, cli: CliOverrides) -> Result<ExportConfig> {
    let defaults = ExportConfig::default();

    let config = ExportConfig {
        input_dir: cli
            .input_dir
            .or(file_cfg.input_directory)
            .unwrap_or(defaults.input_dir),
        target_dir: cli
            .output_dir
            .or(file_cfg.output_directory)
            .unwrap_or(defaults.target_dir),
        user_name: file_cfg.user_name.unwrap_or(defaults.user_name),
        assistant_name: file_cfg.llm_name.unwrap_or(defaults.assistant_name),
        date_format: file_cfg.date_format.unwrap_or(defaults.date_format),
        time_format: file_cfg.time_format.unwrap_or(defaults.time_format),
        include_timestamps: file_cfg
            .include_timestamps
            .unwrap_or(defaults.include_timestamps),
        prefix_date_in_filename: file_cfg
            .prefix_date_in_filename
            .unwrap_or(defaults.prefix_date_in_filename),
        convert_latex: file_cfg
            .convert_latex_syntax
            .unwrap_or(defaults.convert_latex),
        message_separator: file_cfg
            .message_separator
            .unwrap_or(defaults.message_separator),
        skip_empty_messages: file_cfg
            .skip_empty_messages
            .unwrap_or(defaults.skip_empty_messages),
        collapse_long_messages: file_cfg
            .collapse_long_messages
            .unwrap_or(defaults.collapse_long_messages),
        long_message_line_threshold: file_cfg
            .long_message_line_threshold
            .unwrap_or(defaults.long_message_line_threshold),
        collapse_open_by_default: file_cfg
            .collapse_open_by_default
            .unwrap_or(defaults.collapse_open_by_default),
        front_matter: file_cfg
            .obsidian_front_matter
            .unwrap_or(defaults.front_matter),
        quiet: cli.quiet,
    };

    config.validate()?;
    Ok(config)
}
