//! Constants shared across the porter so file names, defaults and
//! environment keys stay consistent between the CLI and the library.

pub const DEFAULT_CONFIG_PATH: &str = "porter.toml";
pub const DEFAULT_OUTPUT_DIR: &str = "output";
pub const FAILED_SUBDIR: &str = "failed";

/// Filename used when a card name has no usable characters
pub const PLACEHOLDER_FILENAME: &str = "card";

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_MODEL_BASE_URL: &str = "https://api.openai.com/v1";
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const BASE_URL_ENV: &str = "OPENAI_BASE_URL";

pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Image extensions accepted by the vision extractor and the color sampler
pub const SUPPORTED_IMAGE_EXTENSIONS: &[&str] = &["png", "webp", "jpg", "jpeg"];

/// Whether `path` carries one of the supported image extensions
pub fn is_supported_image(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}
