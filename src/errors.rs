//! # Pipeline Error Types
//!
//! This module defines the failure taxonomy for the image-to-speech pipeline.
//! Every request ends in exactly one of these outcomes (or success), and the
//! HTTP layer maps each variant onto a status code and error body.

use std::fmt;

/// Terminal failure states of a pipeline request
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Missing, empty, or oversized image payload (caller error)
    InvalidInput(String),
    /// Image bytes could not be decoded (caller error)
    Decode(String),
    /// OCR engine failed after the default-language fallback attempt
    Recognition(String),
    /// Normalization produced an empty string, nothing to speak (caller error)
    NoTextDetected,
    /// TTS engine rejected the request or was unreachable
    Synthesis(String),
    /// Transient upload store could not be written or read
    Storage(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::InvalidInput(msg) => write!(f, "[INVALID_INPUT] {}", msg),
            PipelineError::Decode(msg) => write!(f, "[DECODE] Could not read image: {}", msg),
            PipelineError::Recognition(msg) => {
                write!(f, "[RECOGNITION] Text recognition failed: {}", msg)
            }
            PipelineError::NoTextDetected => write!(f, "[NO_TEXT] No text detected in image"),
            PipelineError::Synthesis(msg) => {
                write!(f, "[SYNTHESIS] Speech synthesis failed: {}", msg)
            }
            PipelineError::Storage(msg) => write!(f, "[STORAGE] Transient storage failed: {}", msg),
        }
    }
}

impl std::error::Error for PipelineError {}

impl PipelineError {
    /// True for failures caused by the caller's input rather than this
    /// service or its engine dependencies. The HTTP layer answers these
    /// with 400, everything else with 500.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            PipelineError::InvalidInput(_)
                | PipelineError::Decode(_)
                | PipelineError::NoTextDetected
        )
    }
}

/// Result type alias for convenience
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Standardized error logging utilities for consistent error reporting
pub mod error_logging {
    use tracing::error;

    /// Log a failed pipeline request with its stage context
    pub fn log_pipeline_error(
        err: &super::PipelineError,
        filename: &str,
        processing_duration: Option<std::time::Duration>,
    ) {
        error!(
            error = %err,
            filename = %filename,
            processing_duration_ms = ?processing_duration.map(|d| d.as_millis()),
            "Pipeline request failed"
        );
    }
}
