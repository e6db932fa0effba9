use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::debug;

use super::{clean_filename, CardStore, NameRegistry, PartialArtifact, StoredCard};
use crate::card::CanonicalCard;
use crate::error::Result;

/// Keeps cards in memory; backs `--dry-run` and tests
pub struct InMemoryStore {
    registry: Arc<NameRegistry>,
    cards: Arc<Mutex<HashMap<String, CanonicalCard>>>,
    failures: Arc<Mutex<Vec<PartialArtifact>>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_registry(Arc::new(NameRegistry::new()))
    }

    pub fn with_registry(registry: Arc<NameRegistry>) -> Self {
        Self {
            registry,
            cards: Arc::new(Mutex::new(HashMap::new())),
            failures: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn card(&self, stem: &str) -> Option<CanonicalCard> {
        let cards = self.cards.lock().unwrap_or_else(|p| p.into_inner());
        cards.get(stem).cloned()
    }

    /// Claimed stems in sorted order
    pub fn stems(&self) -> Vec<String> {
        let cards = self.cards.lock().unwrap_or_else(|p| p.into_inner());
        let mut stems: Vec<String> = cards.keys().cloned().collect();
        stems.sort();
        stems
    }

    pub fn failures(&self) -> Vec<PartialArtifact> {
        self.failures.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl CardStore for InMemoryStore {
    async fn store_card(&self, card: &CanonicalCard) -> Result<StoredCard> {
        let stem = self.registry.claim(&clean_filename(&card.name));

        let mut cards = self.cards.lock().unwrap_or_else(|p| p.into_inner());
        cards.insert(stem.clone(), card.clone());

        debug!("Stored card: {} as {}", card.name, stem);
        Ok(StoredCard { stem, path: None })
    }

    async fn store_failure(&self, artifact: &PartialArtifact) -> Result<Option<PathBuf>> {
        let mut failures = self.failures.lock().unwrap_or_else(|p| p.into_inner());
        failures.push(artifact.clone());

        debug!("Stored failure for {} at stage {:?}", artifact.source, artifact.stage);
        Ok(None)
    }
}
