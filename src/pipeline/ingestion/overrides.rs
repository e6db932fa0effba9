use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{PorterError, Result};
use crate::types::RawRecord;

/// Hand-written corrections keyed by source file name.
///
/// Keys may include the extension (`ogn_001.png`) or not (`ogn_001`); the
/// full file name is tried first.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    entries: HashMap<String, Map<String, Value>>,
}

impl Overrides {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PorterError::Config(format!(
                "Failed to read overrides file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let overrides = Self::from_json_str(&content)?;
        info!("Loaded {} overrides from {}", overrides.len(), path.display());
        Ok(overrides)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content)?;
        let Value::Object(map) = value else {
            return Err(PorterError::Config(
                "overrides file must contain a JSON object".to_string(),
            ));
        };

        let entries = map
            .into_iter()
            .filter_map(|(key, entry)| match entry {
                Value::Object(fields) => Some((key, fields)),
                _ => {
                    debug!("Ignoring non-object override for {}", key);
                    None
                }
            })
            .collect();
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn for_source(&self, source: &Path) -> Option<&Map<String, Value>> {
        let file_name = source.file_name().and_then(|n| n.to_str());
        let stem = source.file_stem().and_then(|n| n.to_str());
        file_name
            .and_then(|n| self.entries.get(n))
            .or_else(|| stem.and_then(|s| self.entries.get(s)))
    }

    /// Replace extracted fields with the override for `source`. Returns the
    /// names of the replaced fields.
    pub fn apply(&self, source: &Path, raw: &mut RawRecord) -> Vec<String> {
        let Some(fields) = self.for_source(source) else {
            return Vec::new();
        };
        let mut applied: Vec<String> = Vec::with_capacity(fields.len());
        for (key, value) in fields {
            raw.insert(key.clone(), value.clone());
            applied.push(key.clone());
        }
        debug!("Applied overrides {:?} to {}", applied, source.display());
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_name_beats_stem() {
        let overrides = Overrides::from_json_str(
            r#"{"ogn_001.png": {"name": "Full"}, "ogn_001": {"name": "Stem"}, "ogn_002": {"name": "Two"}}"#,
        )
        .unwrap();

        assert_eq!(overrides.for_source(Path::new("a/ogn_001.png")).unwrap()["name"], json!("Full"));
        assert_eq!(overrides.for_source(Path::new("a/ogn_002.webp")).unwrap()["name"], json!("Two"));
        assert!(overrides.for_source(Path::new("a/ogn_003.png")).is_none());
    }

    #[test]
    fn test_override_replaces_present_fields() {
        let overrides =
            Overrides::from_json_str(r#"{"card": {"name": "Right Name", "might": 4}}"#).unwrap();
        let mut raw = RawRecord::from_value(json!({"name": "Wrnog Name", "might": 3})).unwrap();

        let applied = overrides.apply(Path::new("card.png"), &mut raw);

        assert_eq!(applied.len(), 2);
        assert_eq!(raw.name().as_deref(), Some("Right Name"));
        assert_eq!(raw.get("might"), Some(&json!(4)));
    }

    #[test]
    fn test_non_object_file_is_rejected() {
        assert!(Overrides::from_json_str("[]").is_err());
        let overrides = Overrides::from_json_str(r#"{"a": 1, "b": {}}"#).unwrap();
        assert_eq!(overrides.len(), 1);
    }
}
