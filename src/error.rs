use thiserror::Error;

#[derive(Error, Debug)]
pub enum PorterError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image decoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Card schema error: {0}")]
    Schema(String),

    #[error("Model error: {message}")]
    Model { message: String },
}

pub type Result<T> = std::result::Result<T, PorterError>;
