use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{info, warn};

use super::{clean_filename, CardStore, NameRegistry, PartialArtifact, StoredCard};
use crate::card::CanonicalCard;
use crate::constants::FAILED_SUBDIR;
use crate::error::Result;

/// Writes one pretty-printed JSON file per card under `output_dir`, and
/// failure artifacts under `output_dir/failed`.
///
/// Failure artifacts claim their stems from a registry of their own, so a
/// rejected card never takes a name away from an accepted one.
pub struct JsonFileStore {
    output_dir: PathBuf,
    registry: Arc<NameRegistry>,
    failed_registry: NameRegistry,
}

impl JsonFileStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self::with_registry(output_dir, Arc::new(NameRegistry::new()))
    }

    pub fn with_registry(output_dir: impl Into<PathBuf>, registry: Arc<NameRegistry>) -> Self {
        Self {
            output_dir: output_dir.into(),
            registry,
            failed_registry: NameRegistry::new(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn failed_dir(&self) -> PathBuf {
        self.output_dir.join(FAILED_SUBDIR)
    }
}

async fn write_json(path: &Path, body: String) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, body + "\n").await?;
    Ok(())
}

#[async_trait]
impl CardStore for JsonFileStore {
    async fn store_card(&self, card: &CanonicalCard) -> Result<StoredCard> {
        let stem = self.registry.claim(&clean_filename(&card.name));
        let path = self.output_dir.join(format!("{}.json", stem));

        write_json(&path, card.to_json_pretty()?).await?;
        info!("Saved {} to {}", card.name, path.display());

        Ok(StoredCard {
            stem,
            path: Some(path),
        })
    }

    async fn store_failure(&self, artifact: &PartialArtifact) -> Result<Option<PathBuf>> {
        let stem = self.failed_registry.claim(&artifact.slug());
        let path = self.failed_dir().join(format!("{}.json", stem));

        write_json(&path, serde_json::to_string_pretty(artifact)?).await?;
        warn!(
            "Wrote partial output for {} to {}",
            artifact.source,
            path.display()
        );
        Ok(Some(path))
    }
}
