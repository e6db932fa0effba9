use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

use super::{parse_raw_record, sibling_image, CardExtractor};
use crate::error::Result;
use crate::types::RawRecord;

/// Reads cached extractor output: one JSON object per `.json` file.
#[derive(Debug, Clone, Default)]
pub struct JsonFileExtractor {
    /// Directory holding the card images the records were taken from
    images_dir: Option<PathBuf>,
}

impl JsonFileExtractor {
    pub fn new(images_dir: Option<PathBuf>) -> Self {
        Self { images_dir }
    }
}

#[async_trait]
impl CardExtractor for JsonFileExtractor {
    fn extractor_name(&self) -> &'static str {
        "json_file"
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false)
    }

    #[instrument(skip(self), fields(source = %source.display()))]
    async fn extract(&self, source: &Path) -> Result<RawRecord> {
        let text = tokio::fs::read_to_string(source).await?;
        let record = parse_raw_record(&text)?;
        debug!("Read {} fields", record.as_map().len());
        Ok(record)
    }

    fn image_for(&self, source: &Path) -> Option<PathBuf> {
        self.images_dir
            .as_deref()
            .and_then(|dir| sibling_image(dir, source))
    }
}
