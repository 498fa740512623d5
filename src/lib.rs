//! # SnapVoice
//!
//! An HTTP service that turns a photographed page of text into a spoken
//! audio clip: decode and binarize the image, recognize its text with
//! Tesseract, rewrite the text for natural narration, and synthesize it
//! to MP3.

pub mod config;
pub mod errors;
pub mod pipeline;
pub mod preprocessing;
pub mod recognition;
pub mod server;
pub mod storage;
pub mod synthesis;
pub mod text_processing;

// Re-export types for easier access
pub use errors::{PipelineError, PipelineResult};
pub use pipeline::{Pipeline, SpeechClip, SpeechRequest};
pub use text_processing::normalize_for_speech;
