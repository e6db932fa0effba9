// Card persistence: output naming, the run-wide name registry, and stores

pub mod in_memory;
pub mod json_files;

pub use in_memory::InMemoryStore;
pub use json_files::JsonFileStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::card::CanonicalCard;
use crate::constants::PLACEHOLDER_FILENAME;
use crate::error::Result;
use crate::pipeline::batch::Stage;
use crate::pipeline::processing::quality_gate::Violation;

/// Turn a card name into a safe file stem.
///
/// Keeps alphanumerics, spaces, hyphens and underscores, then collapses
/// whitespace runs to a single `_`. An empty result becomes `card`.
pub fn clean_filename(name: &str) -> String {
    let safe: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    let joined = safe.split_whitespace().collect::<Vec<_>>().join("_");
    if joined.is_empty() {
        PLACEHOLDER_FILENAME.to_string()
    } else {
        joined
    }
}

/// Output names claimed during the current run.
///
/// Shared by every worker; claiming is serialized so two cards with the
/// same name can never be handed the same stem.
#[derive(Debug, Default)]
pub struct NameRegistry {
    claimed: Mutex<HashSet<String>>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `base`, or the first free `base_2`, `base_3`, ...
    pub fn claim(&self, base: &str) -> String {
        let mut claimed = self.claimed.lock().unwrap_or_else(|p| p.into_inner());
        if claimed.insert(base.to_string()) {
            return base.to_string();
        }
        let mut n = 2usize;
        loop {
            let candidate = format!("{}_{}", base, n);
            if claimed.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.claimed.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Where an accepted card ended up
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredCard {
    /// Claimed file stem, including any collision suffix
    pub stem: String,
    /// File written, `None` when nothing touched the disk
    pub path: Option<PathBuf>,
}

/// Diagnostic dump for a record that did not make it to output
#[derive(Debug, Clone, Serialize)]
pub struct PartialArtifact {
    pub error: String,
    pub source: String,
    pub stage: Stage,
    pub violations: Vec<Violation>,
    pub partial: bool,
    pub failed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized: Option<Value>,
}

impl PartialArtifact {
    pub fn new(source: impl Into<String>, stage: Stage, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            source: source.into(),
            stage,
            violations: Vec::new(),
            partial: true,
            failed_at: Utc::now(),
            raw: None,
            merged: None,
            normalized: None,
        }
    }

    /// Best name for the artifact file: the normalized name, then the
    /// merged or raw name, then the source stem.
    pub fn slug(&self) -> String {
        let name_of = |payload: &Option<Value>| {
            payload
                .as_ref()
                .and_then(|p| p.get("name"))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let source_stem = std::path::Path::new(&self.source)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string());

        let name = name_of(&self.normalized)
            .or_else(|| name_of(&self.merged))
            .or_else(|| name_of(&self.raw))
            .or(source_stem)
            .unwrap_or_default();
        clean_filename(&name)
    }
}

/// Destination for accepted cards and failure artifacts
#[async_trait]
pub trait CardStore: Send + Sync {
    async fn store_card(&self, card: &CanonicalCard) -> Result<StoredCard>;

    async fn store_failure(&self, artifact: &PartialArtifact) -> Result<Option<PathBuf>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_clean_filename() {
        assert_eq!(clean_filename("Jinx!  Wild   Ride?"), "Jinx_Wild_Ride");
        assert_eq!(clean_filename("Kai'Sa, Daughter of the Void"), "KaiSa_Daughter_of_the_Void");
        assert_eq!(clean_filename("  mid-range_card "), "mid-range_card");
        assert_eq!(clean_filename("?!"), "card");
        assert_eq!(clean_filename(""), "card");
    }

    #[test]
    fn test_registry_suffixes_collisions() {
        let registry = NameRegistry::new();
        assert_eq!(registry.claim("Poro"), "Poro");
        assert_eq!(registry.claim("Poro"), "Poro_2");
        assert_eq!(registry.claim("Poro"), "Poro_3");
        assert_eq!(registry.claim("Teemo"), "Teemo");
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_registry_skips_taken_suffixes() {
        let registry = NameRegistry::new();
        registry.claim("Poro_2");
        registry.claim("Poro");
        assert_eq!(registry.claim("Poro"), "Poro_3");
    }

    #[test]
    fn test_registry_is_unique_across_threads() {
        let registry = Arc::new(NameRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || (0..25).map(|_| registry.claim("Poro")).collect::<Vec<_>>())
            })
            .collect();

        let mut all: Vec<String> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        let total = all.len();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), total);
        assert_eq!(total, 200);
    }

    #[test]
    fn test_artifact_slug_prefers_normalized_name() {
        let mut artifact = PartialArtifact::new("scans/ogn_001.png", Stage::Validate, "bad");
        assert_eq!(artifact.slug(), "ogn_001");

        artifact.raw = Some(serde_json::json!({"name": "Raw Name"}));
        assert_eq!(artifact.slug(), "Raw_Name");

        artifact.normalized = Some(serde_json::json!({"name": "Final Name!"}));
        assert_eq!(artifact.slug(), "Final_Name");
    }
}
