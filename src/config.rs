//! # Application Configuration
//!
//! Centralized configuration for the image-to-speech service, grouped into
//! per-concern sections with environment loading and validation. Engine
//! settings (the Tesseract data path in particular) are explicit injected
//! values set once at startup, never process-global mutable state.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the server binds to
    pub bind_address: String,
    /// Maximum accepted multipart request body size in bytes
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5000".to_string(),
            max_body_bytes: 25 * 1024 * 1024, // headroom over the image limit
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.bind_address.trim().is_empty() {
            bail!("Bind address cannot be empty");
        }
        if !self.bind_address.contains(':') {
            bail!("Bind address must be in 'host:port' form");
        }
        if self.max_body_bytes == 0 {
            bail!("Maximum body size cannot be 0");
        }
        Ok(())
    }
}

/// OCR engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Tesseract data directory; `None` uses the engine's compiled-in path
    pub tessdata_path: Option<String>,
    /// Language used when the requested one fails (fallback target)
    pub default_language: String,
    /// Upper bound on one OCR invocation
    pub operation_timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tessdata_path: None,
            default_language: "eng".to_string(),
            operation_timeout_secs: 30,
        }
    }
}

impl OcrConfig {
    pub fn validate(&self) -> Result<()> {
        if self.default_language.trim().is_empty() {
            bail!("OCR default language cannot be empty");
        }
        if self.operation_timeout_secs == 0 {
            bail!("OCR timeout cannot be 0");
        }
        if self.operation_timeout_secs > 300 {
            bail!("OCR timeout cannot be greater than 300 seconds");
        }
        if let Some(path) = &self.tessdata_path {
            if path.trim().is_empty() {
                bail!("TESSDATA_PATH cannot be empty if set");
            }
        }
        Ok(())
    }
}

/// TTS engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    /// Synthesis endpoint URL
    pub endpoint: String,
    /// Per-request HTTP timeout
    pub request_timeout_secs: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://translate.google.com/translate_tts".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl TtsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            bail!("TTS endpoint cannot be empty");
        }
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            bail!("TTS endpoint must be an http(s) URL");
        }
        if self.request_timeout_secs == 0 {
            bail!("TTS timeout cannot be 0");
        }
        if self.request_timeout_secs > 300 {
            bail!("TTS timeout cannot be greater than 300 seconds");
        }
        Ok(())
    }
}

/// Transient upload storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for per-request transient uploads
    pub upload_dir: String,
    /// Largest accepted image payload in bytes
    pub max_image_bytes: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: "tmp_uploads".to_string(),
            max_image_bytes: 10 * 1024 * 1024, // 10MB limit for image files
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Result<()> {
        if self.upload_dir.trim().is_empty() {
            bail!("Upload directory cannot be empty");
        }
        if self.max_image_bytes == 0 {
            bail!("Maximum image size cannot be 0");
        }
        Ok(())
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub ocr: OcrConfig,
    pub tts: TtsConfig,
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(address) = env::var("BIND_ADDRESS") {
            config.server.bind_address = address;
        }
        if let Ok(path) = env::var("TESSDATA_PATH") {
            config.ocr.tessdata_path = Some(path);
        }
        if let Ok(language) = env::var("OCR_DEFAULT_LANGUAGE") {
            config.ocr.default_language = language;
        }
        if let Ok(value) = env::var("OCR_TIMEOUT_SECS") {
            config.ocr.operation_timeout_secs = value
                .parse()
                .context("OCR_TIMEOUT_SECS must be a valid number of seconds")?;
        }
        if let Ok(endpoint) = env::var("TTS_ENDPOINT") {
            config.tts.endpoint = endpoint;
        }
        if let Ok(value) = env::var("TTS_TIMEOUT_SECS") {
            config.tts.request_timeout_secs = value
                .parse()
                .context("TTS_TIMEOUT_SECS must be a valid number of seconds")?;
        }
        if let Ok(dir) = env::var("UPLOAD_DIR") {
            config.storage.upload_dir = dir;
        }
        if let Ok(value) = env::var("MAX_IMAGE_BYTES") {
            config.storage.max_image_bytes = value
                .parse()
                .context("MAX_IMAGE_BYTES must be a valid number of bytes")?;
        }

        Ok(config)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.ocr.validate()?;
        self.tts.validate()?;
        self.storage.validate()?;
        Ok(())
    }
}
