//! # Recognition Adapter
//!
//! Invokes the Tesseract OCR engine on a preprocessed image. Tesseract
//! instances cost 100-500ms to initialize, so they are pooled per language
//! and reused across requests (thread-safe behind `Arc<Mutex<_>>`).
//!
//! Language policy: recognition is attempted with the caller-supplied
//! language tag; if the engine call fails for any reason (missing language
//! pack, engine error) it is retried exactly once with the default language
//! configuration. Language-pack availability varies by deployment, and one
//! automatic fallback trades a little accuracy for availability instead of
//! failing the whole request.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use image::{DynamicImage, GrayImage, ImageFormat};
use leptess::LepTess;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

use crate::config::OcrConfig;

/// Extracts text from a preprocessed image in a requested language.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, image: &GrayImage, language: &str) -> Result<String>;
}

/// Attempt `attempt(requested)`, and on failure retry exactly once with the
/// default language. No fallback happens when the requested language already
/// is the default; the error propagates directly.
pub fn with_language_fallback<T, E: std::fmt::Display>(
    requested: &str,
    default: &str,
    mut attempt: impl FnMut(&str) -> Result<T, E>,
) -> Result<T, E> {
    match attempt(requested) {
        Ok(value) => Ok(value),
        Err(err) if requested != default => {
            warn!(
                requested_language = %requested,
                default_language = %default,
                error = %err,
                "Recognition failed for requested language, retrying with default"
            );
            attempt(default)
        }
        Err(err) => Err(err),
    }
}

/// Thread-safe pool of Tesseract instances keyed by language.
struct InstancePool {
    instances: Mutex<HashMap<String, Arc<Mutex<LepTess>>>>,
}

impl InstancePool {
    fn new() -> Self {
        Self {
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Get or create the instance for a language. First call per language
    /// pays the Tesseract initialization cost; later calls are a map lookup
    /// and an `Arc` clone.
    fn get(&self, tessdata_path: Option<&str>, language: &str) -> Result<Arc<Mutex<LepTess>>> {
        {
            let instances = self
                .instances
                .lock()
                .expect("Failed to acquire instances lock");
            if let Some(instance) = instances.get(language) {
                return Ok(Arc::clone(instance));
            }
        }

        info!("Creating new OCR instance for language: {language}");
        let tess = LepTess::new(tessdata_path, language)
            .map_err(|e| anyhow!("Failed to initialize Tesseract for '{language}': {e}"))?;
        let instance = Arc::new(Mutex::new(tess));

        let mut instances = self
            .instances
            .lock()
            .expect("Failed to acquire instances lock");
        instances.insert(language.to_string(), Arc::clone(&instance));
        Ok(instance)
    }
}

/// Tesseract-backed [`TextRecognizer`].
pub struct TesseractRecognizer {
    config: OcrConfig,
    instances: Arc<InstancePool>,
}

impl TesseractRecognizer {
    pub fn new(config: OcrConfig) -> Self {
        Self {
            config,
            instances: Arc::new(InstancePool::new()),
        }
    }
}

#[async_trait]
impl TextRecognizer for TesseractRecognizer {
    async fn recognize(&self, image: &GrayImage, language: &str) -> Result<String> {
        let png = encode_png(image)?;
        let requested = language.to_string();
        let default = self.config.default_language.clone();
        let tessdata_path = self.config.tessdata_path.clone();
        let pool = Arc::clone(&self.instances);
        let timeout = Duration::from_secs(self.config.operation_timeout_secs);

        // Tesseract is blocking; keep it off the async workers and bound it.
        let task = tokio::task::spawn_blocking(move || {
            with_language_fallback(&requested, &default, |lang| {
                run_tesseract(&pool, tessdata_path.as_deref(), lang, &png)
            })
        });

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => {
                if let Ok(text) = &result {
                    info!("OCR extracted {} characters", text.len());
                }
                result
            }
            Ok(Err(join_error)) => Err(anyhow!("OCR task failed: {join_error}")),
            Err(_) => Err(anyhow!(
                "OCR operation timed out after {} seconds",
                timeout.as_secs()
            )),
        }
    }
}

/// One engine invocation: acquire the pooled instance, load the image,
/// extract text, and clean it up (trim lines, drop empties).
fn run_tesseract(
    pool: &InstancePool,
    tessdata_path: Option<&str>,
    language: &str,
    png: &[u8],
) -> Result<String> {
    let instance = pool.get(tessdata_path, language)?;
    let mut tess = instance
        .lock()
        .expect("Failed to acquire Tesseract instance lock");

    tess.set_image_from_mem(png)
        .map_err(|e| anyhow!("Failed to load image for OCR: {e}"))?;
    let extracted = tess
        .get_utf8_text()
        .map_err(|e| anyhow!("Failed to extract text from image: {e}"))?;

    let cleaned = extracted
        .trim()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<&str>>()
        .join("\n");
    Ok(cleaned)
}

fn encode_png(image: &GrayImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    DynamicImage::ImageLuma8(image.clone())
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .context("Failed to encode preprocessed image for OCR")?;
    Ok(buffer)
}
