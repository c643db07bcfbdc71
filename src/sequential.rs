use crate::assets::AssetResolver;
use crate::importer::{self, ArchiveError, Conversation};
use crate::renderer;
use crate::utils::{ExportConfig, ProcessResult, format_timestamp, sanitize_filename};
use eyre::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};

const UNTITLED: &str = "Untitled";
const FILENAME_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub written: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// The main entry point for the conversion.
/// Reads the archive, then converts conversations one at a time in archive order.
pub fn execute(config: &ExportConfig, pb: &ProgressBar) -> Result<Summary> {
    fs::create_dir_all(&config.target_dir).wrap_err_with(|| {
        format!(
            "Failed to create target directory: {}",
            config.target_dir.display()
        )
    })?;

    let archive_path = config.archive_path();
    tracing::info!(path = %archive_path.display(), "Processing archive");
    let entries = importer::load_archive(&archive_path)?;

    pb.set_length(entries.len() as u64);
    if let Ok(style) =
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%)")
    {
        pb.set_style(style.progress_chars("=>-"));
    }

    let mut registry: HashSet<String> = HashSet::new();
    let mut summary = Summary::default();

    for (idx, entry) in entries.into_iter().enumerate() {
        match export_conversation(idx, entry, config, &mut registry) {
            Ok(ProcessResult::Written) => summary.written += 1,
            Ok(ProcessResult::Skipped) => summary.skipped += 1,
            Err(e) => {
                summary.errors += 1;
                tracing::error!("Error [conversation {}]: {:#}", idx, e);
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();

    if !config.quiet {
        let mut line = format!(
            "Done. {} written, {} skipped.",
            summary.written, summary.skipped
        );
        if summary.errors > 0 {
            line.push_str(&format!(" Completed with {} error(s).", summary.errors));
        }
        eprintln!("{} Your files are in: {}", line, config.target_dir.display());
    }

    Ok(summary)
}

/// The explicit title, else the first line of the first text part plus `...`, else `Untitled`.
pub fn infer_title(conversation: &Conversation) -> String {
    if let Some(title) = conversation.title.as_deref().filter(|t| !t.is_empty()) {
        return title.to_string();
    }

    conversation
        .messages
        .first()
        .and_then(|m| m.content_parts().ok())
        .and_then(|parts| {
            parts.iter().find_map(|p| {
                p.text()
                    .map(|text| format!("{}...", text.trim().lines().next().unwrap_or_default()))
            })
        })
        .unwrap_or_else(|| UNTITLED.to_string())
}

/// Sanitized title, optionally prefixed with the conversation's first date.
pub fn base_filename(conversation: &Conversation, title: &str, config: &ExportConfig) -> String {
    let mut sanitized = sanitize_filename(title);
    if sanitized.is_empty() {
        sanitized = UNTITLED.to_string();
    }

    let date_prefix = config
        .prefix_date_in_filename
        .then(|| conversation.first_timestamp())
        .flatten()
        .and_then(|ts| format_timestamp(ts, FILENAME_DATE_FORMAT));

    match date_prefix {
        Some(date) => format!("{}_{}", date, sanitized),
        None => sanitized,
    }
}

// Claim `base`, or the first free `base_2`, `base_3`, ... if an earlier conversation in
// this run already took it. Compared case-insensitively for case-folding filesystems.
fn allocate_filename(base: &str, registry: &mut HashSet<String>) -> String {
    let mut candidate = base.to_string();
    let mut n = 1;
    while !registry.insert(candidate.to_lowercase()) {
        n += 1;
        candidate = format!("{}_{}", base, n);
    }
    candidate
}

fn export_conversation(
    idx: usize,
    entry: Value,
    config: &ExportConfig,
    registry: &mut HashSet<String>,
) -> Result<ProcessResult> {
    let conversation = match Conversation::from_value(entry) {
        Ok(c) => c,
        Err(e @ ArchiveError::NotARecord(_)) => {
            tracing::warn!("Skipping entry {}: {}", idx, e);
            return Ok(ProcessResult::Skipped);
        }
        Err(e) => return Err(e.into()),
    };

    if conversation.messages.is_empty() {
        tracing::warn!("Skipping conversation {} with no messages.", idx);
        return Ok(ProcessResult::Skipped);
    }

    let title = infer_title(&conversation);
    let stem = allocate_filename(&base_filename(&conversation, &title, config), registry);
    let path = config.target_dir.join(format!("{}.md", stem));

    let md_file =
        File::create(&path).wrap_err_with(|| format!("Failed to create: {}", path.display()))?;
    let mut writer = BufWriter::new(md_file);

    if config.front_matter {
        let date = conversation
            .first_timestamp()
            .and_then(|ts| format_timestamp(ts, &config.date_format));
        let block = renderer::render_front_matter(&title, date)
            .wrap_err("Failed to serialize front matter")?;
        writer.write_all(block.as_bytes())?;
    }

    let mut assets = AssetResolver::new(&config.input_dir, &config.target_dir, &stem);
    for (n, message) in conversation.messages.iter().enumerate() {
        match renderer::render_message(message, config, &mut assets) {
            Ok(text) => writer
                .write_all(text.as_bytes())
                .wrap_err_with(|| format!("Failed to write: {}", path.display()))?,
            Err(e) => tracing::warn!("Skipping message {} of {}.md: {}", n, stem, e),
        }
    }

    writer.flush().wrap_err("Failed to flush markdown file")?;
    drop(writer);

    tracing::info!(images = assets.copied(), "Wrote {}.md", stem);
    Ok(ProcessResult::Written)
}
