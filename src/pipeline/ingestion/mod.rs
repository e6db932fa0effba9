// Card ingestion: extractors that turn a source file into a raw record,
// plus manual overrides and source discovery

pub mod json_file;
pub mod overrides;
pub mod prompts;
pub mod vision;

pub use json_file::JsonFileExtractor;
pub use overrides::Overrides;
pub use vision::VisionExtractor;

use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{is_supported_image, SUPPORTED_IMAGE_EXTENSIONS};
use crate::error::{PorterError, Result};
use crate::types::RawRecord;

/// Produces one raw record per source file
#[async_trait]
pub trait CardExtractor: Send + Sync {
    fn extractor_name(&self) -> &'static str;

    /// Whether `path` is something this extractor can read
    fn accepts(&self, path: &Path) -> bool;

    async fn extract(&self, source: &Path) -> Result<RawRecord>;

    /// Image to sample colors from for `source`, if one exists
    fn image_for(&self, source: &Path) -> Option<PathBuf>;
}

/// Remove a surrounding ``` or ```json fence that models like to add.
pub fn strip_markdown_fences(text: &str) -> &str {
    let mut text = text.trim();
    if text.starts_with("```") {
        if let Some(newline) = text.find('\n') {
            text = text[newline + 1..].trim();
        }
    }
    if let Some(stripped) = text.strip_suffix("```") {
        text = stripped.trim();
    }
    text
}

/// Parse model or file output into a raw record, tolerating code fences.
pub fn parse_raw_record(text: &str) -> Result<RawRecord> {
    let value = serde_json::from_str(strip_markdown_fences(text))?;
    RawRecord::from_value(value)
}

/// A file, or every file in a directory (sorted) that `accepts` allows.
pub fn collect_sources(path: &Path, accepts: impl Fn(&Path) -> bool) -> Result<Vec<PathBuf>> {
    if !path.exists() {
        return Err(PorterError::Config(format!(
            "path not found: {}",
            path.display()
        )));
    }

    if path.is_dir() {
        let mut sources: Vec<PathBuf> = fs::read_dir(path)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && accepts(p))
            .collect();
        if sources.is_empty() {
            return Err(PorterError::Config(format!(
                "no supported files found in {}",
                path.display()
            )));
        }
        sources.sort();
        return Ok(sources);
    }

    if !accepts(path) {
        return Err(PorterError::Config(format!(
            "unsupported file type: {}",
            path.display()
        )));
    }
    Ok(vec![path.to_path_buf()])
}

/// Image in `dir` sharing the stem of `source`, trying each supported
/// extension in turn.
pub fn sibling_image(dir: &Path, source: &Path) -> Option<PathBuf> {
    let stem = source.file_stem()?;
    SUPPORTED_IMAGE_EXTENSIONS
        .iter()
        .map(|ext| dir.join(stem).with_extension(ext))
        .find(|candidate| candidate.is_file() && is_supported_image(candidate))
}
