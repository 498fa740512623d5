//! # HTTP Server Module
//!
//! Exposes the pipeline as `POST /process`: a multipart form with an `image`
//! part plus optional `ocr_lang` / `tts_lang` fields, answered with raw
//! `audio/mpeg` bytes on success or a JSON `{error, detail?}` body on
//! failure. Caller errors map to 400, engine and storage failures to 500.

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::errors::{error_logging, PipelineError};
use crate::pipeline::{Pipeline, SpeechRequest};

/// OCR language used when the form does not name one.
pub const DEFAULT_OCR_LANGUAGE: &str = "eng";

/// Speech language used when the form does not name one.
pub const DEFAULT_TTS_LANGUAGE: &str = "en";

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

/// Structured error body returned on every failure.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Build the service router.
pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/process", post(process_image))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// `POST /process`
///
/// Multipart fields: `image` (binary, required), `ocr_lang` (optional,
/// default `"eng"`), `tts_lang` (optional, default `"en"`).
async fn process_image(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let started = Instant::now();

    let mut image: Option<(String, Bytes)> = None;
    let mut ocr_language = DEFAULT_OCR_LANGUAGE.to_string();
    let mut tts_language = DEFAULT_TTS_LANGUAGE.to_string();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                return error_body(
                    StatusCode::BAD_REQUEST,
                    "Invalid form data",
                    Some(err.to_string()),
                )
            }
        };

        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("image") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                match field.bytes().await {
                    Ok(bytes) => image = Some((filename, bytes)),
                    Err(err) => {
                        return error_body(
                            StatusCode::BAD_REQUEST,
                            "Invalid form data",
                            Some(err.to_string()),
                        )
                    }
                }
            }
            Some("ocr_lang") => {
                if let Ok(value) = field.text().await {
                    if !value.trim().is_empty() {
                        ocr_language = value.trim().to_string();
                    }
                }
            }
            Some("tts_lang") => {
                if let Ok(value) = field.text().await {
                    if !value.trim().is_empty() {
                        tts_language = value.trim().to_string();
                    }
                }
            }
            _ => {}
        }
    }

    let Some((filename, bytes)) = image else {
        return error_body(StatusCode::BAD_REQUEST, "No image part", None);
    };
    if filename.is_empty() {
        return error_body(StatusCode::BAD_REQUEST, "No selected file", None);
    }

    let request = SpeechRequest {
        image: bytes,
        filename: filename.clone(),
        ocr_language,
        tts_language,
    };

    match state.pipeline.run(request).await {
        Ok(clip) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, clip.content_type)],
            clip.audio,
        )
            .into_response(),
        Err(err) => {
            error_logging::log_pipeline_error(&err, &filename, Some(started.elapsed()));
            pipeline_error_response(&err)
        }
    }
}

/// Map a pipeline failure onto its HTTP status and error body.
fn pipeline_error_response(err: &PipelineError) -> Response {
    let status = if err.is_caller_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    match err {
        PipelineError::InvalidInput(message) => error_body(status, message, None),
        PipelineError::Decode(detail) => {
            error_body(status, "Could not read image", Some(detail.clone()))
        }
        PipelineError::NoTextDetected => error_body(status, "No text detected in image", None),
        PipelineError::Recognition(detail) => {
            error_body(status, "Text recognition failed", Some(detail.clone()))
        }
        PipelineError::Synthesis(detail) => {
            error_body(status, "Speech synthesis failed", Some(detail.clone()))
        }
        PipelineError::Storage(detail) => {
            error_body(status, "Processing failed", Some(detail.clone()))
        }
    }
}

fn error_body(status: StatusCode, error: &str, detail: Option<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: error.to_string(),
            detail,
        }),
    )
        .into_response()
}
