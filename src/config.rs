use serde::Deserialize;
use std::fs;
use std::path::Path;
use crate::constants::{DEFAULT_CONFIG_PATH, DEFAULT_MODEL, DEFAULT_MODEL_BASE_URL, DEFAULT_OUTPUT_DIR};
use crate::error::{PorterError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub reconcile: ReconcileConfig,
    pub batch: BatchConfig,
    pub model: ModelConfig,
}

/// Tunables for the reconciliation pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Minimum sampled color confidence before a color hint may set domains
    pub color_hint_min_confidence: f64,
    /// Confidence at which a color hint may also rewrite the power icons
    pub color_hint_cost_confidence: f64,
    /// Domain count above which validation emits a warning
    pub max_domains: usize,
    /// Derive effects from keywords and rules text when the extractor gave none
    pub derive_effects: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            color_hint_min_confidence: 0.6,
            color_hint_cost_confidence: 0.8,
            max_domains: 2,
            derive_effects: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub workers: usize,
    pub output_dir: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            output_dir: DEFAULT_OUTPUT_DIR.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub name: String,
    pub base_url: String,
    pub temperature: f64,
    pub top_p: Option<f64>,
    pub seed: Option<i64>,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub max_output_tokens: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_MODEL_BASE_URL.to_string(),
            temperature: 0.0,
            top_p: None,
            seed: None,
            timeout_seconds: 60,
            max_retries: 2,
            max_output_tokens: 2048,
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from `porter.toml` when it exists.
    /// A missing default file yields the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if !default_path.exists() {
                    return Ok(Config::default());
                }
                default_path
            }
        };

        let config_content = fs::read_to_string(config_path).map_err(|e| {
            PorterError::Config(format!(
                "Failed to read config file '{}': {}",
                config_path.display(),
                e
            ))
        })?;

        Self::from_toml_str(&config_content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let r = &self.reconcile;
        for (key, value) in [
            ("reconcile.color_hint_min_confidence", r.color_hint_min_confidence),
            ("reconcile.color_hint_cost_confidence", r.color_hint_cost_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PorterError::Config(format!(
                    "{key} must be between 0.0 and 1.0, got {value}"
                )));
            }
        }
        if self.batch.workers == 0 {
            return Err(PorterError::Config("batch.workers must be at least 1".to_string()));
        }
        Ok(())
    }
}
