use crate::importer::{Author, ImagePointer};
use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

static FILE_SERVICE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^file-service://(file-[a-zA-Z0-9]+)").unwrap());
static SEDIMENT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^sediment://(file_[a-f0-9]+)").unwrap());

/// Subfolder of the export that holds DALL·E output.
const DALLE_DIR: &str = "dalle-generations";

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Unrecognised asset pointer: {0:?}")]
    UnparsablePointer(String),
    #[error("Image folder does not exist: {}", .0.display())]
    MissingDirectory(PathBuf),
    #[error("Image file not found for file_id: {0}")]
    NotFound(String),
    #[error("Failed to copy image {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Extract the file id an asset pointer refers to.
///
/// `file-service://file-AbC123` → `file-AbC123`, `sediment://file_00ab` → `file_00ab`.
pub fn parse_asset_pointer(pointer: &str) -> Option<&str> {
    let re = if pointer.starts_with("file-service://") {
        &*FILE_SERVICE_ID
    } else if pointer.starts_with("sediment://") {
        &*SEDIMENT_ID
    } else {
        return None;
    };
    re.captures(pointer)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Copies the images of one conversation into the output folder.
///
/// Copies are named `<stem>_image_<n><ext>`, `n` counting successful copies from 1.
pub struct AssetResolver<'a> {
    input_dir: &'a Path,
    target_dir: &'a Path,
    stem: &'a str,
    next_index: usize,
}

impl<'a> AssetResolver<'a> {
    pub fn new(input_dir: &'a Path, target_dir: &'a Path, stem: &'a str) -> Self {
        Self {
            input_dir,
            target_dir,
            stem,
            next_index: 1,
        }
    }

    /// Number of images copied so far.
    pub fn copied(&self) -> usize {
        self.next_index - 1
    }

    /// Locate the image behind `image`, copy it next to the Markdown file and return the new
    /// file name. Failures leave the counter untouched.
    pub fn resolve(&mut self, image: &ImagePointer, author: &Author) -> Result<String, AssetError> {
        let file_id = parse_asset_pointer(&image.asset_pointer)
            .ok_or_else(|| AssetError::UnparsablePointer(image.asset_pointer.clone()))?;

        let search_dir = if author.is_dalle() {
            self.input_dir.join(DALLE_DIR)
        } else {
            self.input_dir.to_path_buf()
        };

        let source = find_by_prefix(&search_dir, file_id)?;
        let data = fs::read(&source).map_err(|source_err| AssetError::Io {
            path: source.clone(),
            source: source_err,
        })?;

        let ext = match source.extension() {
            Some(ext) => format!(".{}", ext.to_string_lossy()),
            None => infer::get(&data)
                .map(|kind| format!(".{}", kind.extension()))
                .unwrap_or_default(),
        };

        let file_name = format!("{}_image_{}{}", self.stem, self.next_index, ext);
        let dest = self.target_dir.join(&file_name);
        fs::write(&dest, &data).map_err(|source| AssetError::Io { path: dest, source })?;

        self.next_index += 1;
        Ok(file_name)
    }
}

/// First file (by name) in `dir` whose name starts with `file_id`.
fn find_by_prefix(dir: &Path, file_id: &str) -> Result<PathBuf, AssetError> {
    let entries =
        fs::read_dir(dir).map_err(|_| AssetError::MissingDirectory(dir.to_path_buf()))?;

    let mut matches: Vec<PathBuf> = entries
        .flatten()
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter(|e| e.file_name().to_string_lossy().starts_with(file_id))
        .map(|e| e.path())
        .collect();
    matches.sort();

    matches
        .into_iter()
        .next()
        .ok_or_else(|| AssetError::NotFound(file_id.to_string()))
}
