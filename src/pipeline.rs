//! # Pipeline Orchestrator
//!
//! Sequences one request through preprocess → recognize → normalize →
//! synthesize, enforcing size and validity limits, translating every failure
//! into a [`PipelineError`], and guaranteeing that the transient on-disk
//! copy of the upload is released on every exit path.
//!
//! One request owns one image buffer; nothing is shared between concurrent
//! requests except the upload directory, whose per-request file names are
//! unique.

use bytes::Bytes;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::errors::{PipelineError, PipelineResult};
use crate::preprocessing::{self, PreprocessingError};
use crate::recognition::TextRecognizer;
use crate::storage::TransientStore;
use crate::synthesis::{SpeechSynthesizer, AUDIO_MIME};
use crate::text_processing;

/// One inbound request: the raw image plus its language tags.
#[derive(Debug, Clone)]
pub struct SpeechRequest {
    pub image: Bytes,
    pub filename: String,
    pub ocr_language: String,
    pub tts_language: String,
}

/// The synthesized result streamed back to the caller.
#[derive(Debug, Clone)]
pub struct SpeechClip {
    pub audio: Bytes,
    pub content_type: &'static str,
    /// Characters of normalized text that were spoken
    pub character_count: usize,
}

/// The end-to-end image-to-speech pipeline.
pub struct Pipeline {
    recognizer: Arc<dyn TextRecognizer>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    store: TransientStore,
    max_image_bytes: u64,
}

impl Pipeline {
    pub fn new(
        recognizer: Arc<dyn TextRecognizer>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        store: TransientStore,
        max_image_bytes: u64,
    ) -> Self {
        Self {
            recognizer,
            synthesizer,
            store,
            max_image_bytes,
        }
    }

    /// Run one request through the whole pipeline.
    ///
    /// The spooled upload is removed when this function returns, whichever
    /// branch it returns through; removal failures are logged and discarded
    /// so they can never mask the primary outcome.
    pub async fn run(&self, request: SpeechRequest) -> PipelineResult<SpeechClip> {
        let started = Instant::now();

        if request.image.is_empty() {
            return Err(PipelineError::InvalidInput("No selected file".to_string()));
        }
        if request.image.len() as u64 > self.max_image_bytes {
            return Err(PipelineError::InvalidInput(format!(
                "Image too large: {} bytes (maximum allowed: {} bytes)",
                request.image.len(),
                self.max_image_bytes
            )));
        }

        let upload = self
            .store
            .spool(&request.filename, &request.image)
            .map_err(|e| PipelineError::Storage(e.to_string()))?;
        debug!(path = %upload.path().display(), "Spooled upload");

        // Decoding, denoising and binarization are CPU-bound; keep them off
        // the async workers.
        let upload_path = upload.path().to_path_buf();
        let binary = tokio::task::spawn_blocking(move || preprocessing::preprocess_file(&upload_path))
            .await
            .map_err(|e| PipelineError::Storage(format!("Preprocessing task failed: {e}")))??;
        debug!(
            width = binary.width(),
            height = binary.height(),
            "Preprocessed image for recognition"
        );

        let recognized = self
            .recognizer
            .recognize(&binary, &request.ocr_language)
            .await
            .map_err(|e| PipelineError::Recognition(e.to_string()))?;

        let spoken = text_processing::normalize_for_speech(&recognized);
        if spoken.is_empty() {
            return Err(PipelineError::NoTextDetected);
        }

        let audio = self
            .synthesizer
            .synthesize(&spoken, &request.tts_language)
            .await
            .map_err(|e| PipelineError::Synthesis(e.to_string()))?;

        let character_count = spoken.chars().count();
        info!(
            filename = %request.filename,
            characters = character_count,
            audio_bytes = audio.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Pipeline completed"
        );

        Ok(SpeechClip {
            audio,
            content_type: AUDIO_MIME,
            character_count,
        })
    }
}

impl From<PreprocessingError> for PipelineError {
    fn from(err: PreprocessingError) -> Self {
        match err {
            PreprocessingError::Decode { message } => PipelineError::Decode(message),
            PreprocessingError::Io { message } => PipelineError::Storage(message),
        }
    }
}
