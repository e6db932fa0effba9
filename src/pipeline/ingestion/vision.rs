use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::prompts::{repair_prompt, EXTRACT_INSTRUCTION, REPAIR_SYSTEM_PROMPT, SYSTEM_PROMPT};
use super::{parse_raw_record, strip_markdown_fences, CardExtractor};
use crate::config::ModelConfig;
use crate::constants::{is_supported_image, API_KEY_ENV, BASE_URL_ENV};
use crate::error::{PorterError, Result};
use crate::types::RawRecord;

const MAX_IMAGE_DIMENSION: u32 = 1024;
const JPEG_QUALITY: u8 = 85;
const REPAIR_MAX_TOKENS: u32 = 1024;
const RETRY_BACKOFF_MS: u64 = 500;

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Reads card images with a vision model behind an OpenAI-compatible
/// chat-completions endpoint.
pub struct VisionExtractor {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    config: ModelConfig,
}

impl VisionExtractor {
    pub fn new(config: ModelConfig, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        let endpoint = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));

        Ok(Self {
            client,
            endpoint,
            api_key,
            config,
        })
    }

    /// Build from the environment: the API key is required, and the base
    /// URL variable, when set, wins over the configured one.
    pub fn from_env(mut config: ModelConfig) -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV)
            .map_err(|_| PorterError::Config(format!("{} is not set", API_KEY_ENV)))?;
        if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
            if !base_url.trim().is_empty() {
                config.base_url = base_url;
            }
        }
        Self::new(config, Some(api_key))
    }

    pub fn model_name(&self) -> &str {
        &self.config.name
    }

    fn request_body(&self, messages: Value, max_tokens: u32) -> Value {
        let mut body = json!({
            "model": self.config.name,
            "messages": messages,
            "temperature": self.config.temperature,
            "max_tokens": max_tokens,
            "response_format": {"type": "json_object"},
        });
        if let Some(top_p) = self.config.top_p {
            body["top_p"] = json!(top_p);
        }
        if let Some(seed) = self.config.seed {
            body["seed"] = json!(seed);
        }
        body
    }

    /// POST a chat completion and return the fence-stripped reply text.
    /// Transport errors, 429 and 5xx are retried with linear backoff.
    async fn complete(&self, body: &Value) -> Result<String> {
        let mut attempt = 0u32;
        loop {
            match self.send_once(body).await {
                Ok(text) => return Ok(text),
                Err(RequestError::Retryable(message)) if attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(
                        "Model request failed ({}), retry {}/{}",
                        message, attempt, self.config.max_retries
                    );
                    tokio::time::sleep(Duration::from_millis(RETRY_BACKOFF_MS * attempt as u64))
                        .await;
                }
                Err(RequestError::Retryable(message)) | Err(RequestError::Fatal(message)) => {
                    return Err(PorterError::Model { message });
                }
            }
        }
    }

    async fn send_once(&self, body: &Value) -> std::result::Result<String, RequestError> {
        let mut request = self.client.post(&self.endpoint).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RequestError::Retryable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            let message = format!("model request failed with status {}: {}", status, detail.trim());
            return Err(if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                RequestError::Retryable(message)
            } else {
                RequestError::Fatal(message)
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| RequestError::Fatal(format!("unexpected response shape: {}", e)))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| RequestError::Fatal("model returned no text".to_string()))?;

        Ok(strip_markdown_fences(&content).to_string())
    }

    async fn repair(&self, broken: &str) -> Result<RawRecord> {
        let messages = json!([
            {"role": "system", "content": REPAIR_SYSTEM_PROMPT},
            {"role": "user", "content": repair_prompt(broken)},
        ]);
        let repaired = self
            .complete(&self.request_body(messages, REPAIR_MAX_TOKENS))
            .await?;
        parse_raw_record(&repaired)
    }
}

enum RequestError {
    Retryable(String),
    Fatal(String),
}

#[async_trait]
impl CardExtractor for VisionExtractor {
    fn extractor_name(&self) -> &'static str {
        "vision"
    }

    fn accepts(&self, path: &Path) -> bool {
        is_supported_image(path)
    }

    #[instrument(skip(self), fields(source = %source.display(), model = %self.config.name))]
    async fn extract(&self, source: &Path) -> Result<RawRecord> {
        let image_path = source.to_path_buf();
        let data_url = tokio::task::spawn_blocking(move || image_to_data_url(&image_path))
            .await
            .map_err(|e| PorterError::Model {
                message: format!("image encoding task failed: {}", e),
            })??;

        let messages = json!([
            {"role": "system", "content": SYSTEM_PROMPT},
            {"role": "user", "content": [
                {"type": "text", "text": EXTRACT_INSTRUCTION},
                {"type": "image_url", "image_url": {"url": data_url}},
            ]},
        ]);
        let text = self
            .complete(&self.request_body(messages, self.config.max_output_tokens))
            .await?;

        match parse_raw_record(&text) {
            Ok(record) => {
                info!("Extracted {} fields", record.as_map().len());
                Ok(record)
            }
            Err(e) => {
                debug!("Model output did not parse ({}), asking for a repair", e);
                self.repair(&text).await.map_err(|_| PorterError::Model {
                    message: format!(
                        "model output was not valid JSON and repair failed; raw output was:\n{}",
                        text
                    ),
                })
            }
        }
    }

    fn image_for(&self, source: &Path) -> Option<PathBuf> {
        is_supported_image(source).then(|| source.to_path_buf())
    }
}

/// JPEG data URL for `path`, shrunk to fit within 1024x1024.
pub fn image_to_data_url(path: &Path) -> Result<String> {
    let mut img = image::open(path)?;
    if img.width() > MAX_IMAGE_DIMENSION || img.height() > MAX_IMAGE_DIMENSION {
        img = img.resize(MAX_IMAGE_DIMENSION, MAX_IMAGE_DIMENSION, FilterType::Lanczos3);
    }
    let rgb = img.to_rgb8();

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY).encode_image(&rgb)?;

    Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(&jpeg)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Answers one connection per scripted response and hands back the
    /// request bodies it saw.
    async fn scripted_server(responses: Vec<(u16, String)>) -> (String, JoinHandle<Vec<Value>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let mut bodies = Vec::new();
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                bodies.push(read_request_body(&mut socket).await);

                let reply = format!(
                    "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            }
            bodies
        });
        (base_url, handle)
    }

    async fn read_request_body(socket: &mut tokio::net::TcpStream) -> Value {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 8192];
        let header_end = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
        let length: usize = headers
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .map(|v| v.trim().parse().unwrap())
            .unwrap_or(0);
        while buf.len() < header_end + length {
            let n = socket.read(&mut chunk).await.unwrap();
            buf.extend_from_slice(&chunk[..n]);
        }
        serde_json::from_slice(&buf[header_end..header_end + length]).unwrap()
    }

    fn completion(content: &str) -> String {
        json!({"choices": [{"message": {"role": "assistant", "content": content}}]}).to_string()
    }

    fn extractor(base_url: &str, max_retries: u32) -> VisionExtractor {
        let config = ModelConfig {
            base_url: base_url.to_string(),
            seed: Some(7),
            max_retries,
            ..ModelConfig::default()
        };
        VisionExtractor::new(config, Some("test-key".to_string())).unwrap()
    }

    fn card_image(dir: &Path) -> PathBuf {
        let path = dir.join("jinx.png");
        RgbImage::from_pixel(16, 24, Rgb([200, 30, 30])).save(&path).unwrap();
        path
    }

    #[tokio::test]
    async fn test_extracts_fenced_reply() {
        let dir = tempfile::tempdir().unwrap();
        let image = card_image(dir.path());
        let (base_url, server) =
            scripted_server(vec![(200, completion("```json\n{\"name\": \"Jinx\"}\n```"))]).await;

        let record = extractor(&base_url, 0).extract(&image).await.unwrap();
        assert_eq!(record.name().as_deref(), Some("Jinx"));

        let bodies = server.await.unwrap();
        let body = &bodies[0];
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["seed"], 7);
        assert_eq!(body["max_tokens"], 2048);
        assert_eq!(body["response_format"]["type"], "json_object");
        assert!(body.get("top_p").is_none());
        let url = body["messages"][1]["content"][1]["image_url"]["url"].as_str().unwrap();
        assert!(url.starts_with("data:image/jpeg;base64,"));
    }

    #[tokio::test]
    async fn test_broken_json_is_repaired_once() {
        let dir = tempfile::tempdir().unwrap();
        let image = card_image(dir.path());
        let (base_url, server) = scripted_server(vec![
            (200, completion("{\"name\": \"Jinx\",}")),
            (200, completion("{\"name\": \"Jinx\"}")),
        ])
        .await;

        let record = extractor(&base_url, 0).extract(&image).await.unwrap();
        assert_eq!(record.name().as_deref(), Some("Jinx"));

        let bodies = server.await.unwrap();
        assert_eq!(bodies[1]["max_tokens"], 1024);
        let prompt = bodies[1]["messages"][1]["content"].as_str().unwrap();
        assert!(prompt.contains("{\"name\": \"Jinx\",}"));
    }

    #[tokio::test]
    async fn test_failed_repair_is_a_model_error() {
        let dir = tempfile::tempdir().unwrap();
        let image = card_image(dir.path());
        let (base_url, _server) = scripted_server(vec![
            (200, completion("name: Jinx")),
            (200, completion("still not json")),
        ])
        .await;

        let err = extractor(&base_url, 0).extract(&image).await.unwrap_err();
        match err {
            PorterError::Model { message } => assert!(message.contains("name: Jinx")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let dir = tempfile::tempdir().unwrap();
        let image = card_image(dir.path());
        let (base_url, _server) = scripted_server(vec![
            (503, "{}".to_string()),
            (200, completion("{\"name\": \"Jinx\"}")),
        ])
        .await;

        let record = extractor(&base_url, 1).extract(&image).await.unwrap();
        assert_eq!(record.name().as_deref(), Some("Jinx"));
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let image = card_image(dir.path());
        let (base_url, _server) = scripted_server(vec![(401, "{}".to_string())]).await;

        let err = extractor(&base_url, 3).extract(&image).await.unwrap_err();
        assert!(err.to_string().contains("401"));
    }

    #[test]
    fn test_data_url_is_downscaled_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.png");
        RgbImage::from_pixel(2048, 1024, Rgb([10, 120, 40])).save(&path).unwrap();

        let url = image_to_data_url(&path).unwrap();
        let encoded = url.strip_prefix("data:image/jpeg;base64,").unwrap();
        let decoded = image::load_from_memory(&STANDARD.decode(encoded).unwrap()).unwrap();

        assert_eq!((decoded.width(), decoded.height()), (1024, 512));
    }

    #[test]
    fn test_missing_image_is_an_error() {
        assert!(image_to_data_url(Path::new("/nonexistent/card.png")).is_err());
    }
}
