//! End-to-end pipeline tests with stubbed OCR/TTS engines: outcome mapping,
//! limit enforcement, and transient-storage cleanup on every exit path.

use anyhow::{bail, Result};
use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, GrayImage, Luma};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use snapvoice::pipeline::{Pipeline, SpeechRequest};
use snapvoice::recognition::TextRecognizer;
use snapvoice::storage::TransientStore;
use snapvoice::synthesis::SpeechSynthesizer;
use snapvoice::PipelineError;

const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

struct StubRecognizer {
    text: Result<String, String>,
    calls: AtomicUsize,
}

impl StubRecognizer {
    fn returning(text: &str) -> Arc<Self> {
        Arc::new(Self {
            text: Ok(text.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            text: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextRecognizer for StubRecognizer {
    async fn recognize(&self, _image: &GrayImage, _language: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.text {
            Ok(text) => Ok(text.clone()),
            Err(message) => bail!("{message}"),
        }
    }
}

struct StubSynthesizer {
    fail: bool,
    calls: AtomicUsize,
}

impl StubSynthesizer {
    fn ok() -> Arc<Self> {
        Arc::new(Self {
            fail: false,
            calls: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            calls: AtomicUsize::new(0),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechSynthesizer for StubSynthesizer {
    async fn synthesize(&self, _text: &str, _language: &str) -> Result<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            bail!("engine unreachable");
        }
        Ok(Bytes::from_static(b"mp3-bytes"))
    }
}

fn png_bytes() -> Bytes {
    let mut image = GrayImage::from_pixel(64, 48, Luma([220]));
    for x in 12..40 {
        for y in 16..28 {
            image.put_pixel(x, y, Luma([30]));
        }
    }
    let mut buffer = Vec::new();
    DynamicImage::ImageLuma8(image)
        .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
        .unwrap();
    Bytes::from(buffer)
}

fn request(image: Bytes) -> SpeechRequest {
    SpeechRequest {
        image,
        filename: "page.png".to_string(),
        ocr_language: "eng".to_string(),
        tts_language: "en".to_string(),
    }
}

fn upload_dir_is_empty(dir: &tempfile::TempDir) -> bool {
    std::fs::read_dir(dir.path()).unwrap().next().is_none()
}

#[tokio::test]
async fn test_successful_request_yields_mpeg_audio() {
    let dir = tempfile::tempdir().unwrap();
    let recognizer = StubRecognizer::returning("Hello, world.");
    let synthesizer = StubSynthesizer::ok();
    let pipeline = Pipeline::new(
        recognizer.clone(),
        synthesizer.clone(),
        TransientStore::new(dir.path()),
        MAX_IMAGE_BYTES,
    );

    let clip = pipeline.run(request(png_bytes())).await.unwrap();
    assert_eq!(clip.content_type, "audio/mpeg");
    assert_eq!(clip.audio.as_ref(), b"mp3-bytes");
    assert_eq!(clip.character_count, "Hello, world.".len());
    assert_eq!(recognizer.call_count(), 1);
    assert_eq!(synthesizer.call_count(), 1);
    assert!(upload_dir_is_empty(&dir));
}

#[tokio::test]
async fn test_empty_payload_is_rejected_before_any_engine_call() {
    let dir = tempfile::tempdir().unwrap();
    let recognizer = StubRecognizer::returning("text");
    let synthesizer = StubSynthesizer::ok();
    let pipeline = Pipeline::new(
        recognizer.clone(),
        synthesizer.clone(),
        TransientStore::new(dir.path()),
        MAX_IMAGE_BYTES,
    );

    let err = pipeline.run(request(Bytes::new())).await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidInput(_)));
    assert_eq!(recognizer.call_count(), 0);
    assert_eq!(synthesizer.call_count(), 0);
    assert!(upload_dir_is_empty(&dir));
}

#[tokio::test]
async fn test_oversized_payload_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(
        StubRecognizer::returning("text"),
        StubSynthesizer::ok(),
        TransientStore::new(dir.path()),
        16, // tiny limit for the test
    );

    let err = pipeline.run(request(png_bytes())).await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidInput(_)));
    assert!(upload_dir_is_empty(&dir));
}

#[tokio::test]
async fn test_undecodable_image_fails_with_decode_error_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let recognizer = StubRecognizer::returning("text");
    let synthesizer = StubSynthesizer::ok();
    let pipeline = Pipeline::new(
        recognizer.clone(),
        synthesizer.clone(),
        TransientStore::new(dir.path()),
        MAX_IMAGE_BYTES,
    );

    let err = pipeline
        .run(request(Bytes::from_static(b"not an image at all")))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Decode(_)));
    assert_eq!(recognizer.call_count(), 0);
    assert_eq!(synthesizer.call_count(), 0);
    assert!(upload_dir_is_empty(&dir));
}

#[tokio::test]
async fn test_garbage_recognition_yields_no_text_detected() {
    let dir = tempfile::tempdir().unwrap();
    let recognizer = StubRecognizer::returning("\u{fffd}\u{2603}\u{00a9}");
    let synthesizer = StubSynthesizer::ok();
    let pipeline = Pipeline::new(
        recognizer.clone(),
        synthesizer.clone(),
        TransientStore::new(dir.path()),
        MAX_IMAGE_BYTES,
    );

    let err = pipeline.run(request(png_bytes())).await.unwrap_err();
    assert_eq!(err, PipelineError::NoTextDetected);
    // The synthesizer must never be called for empty normalized text.
    assert_eq!(synthesizer.call_count(), 0);
    assert!(upload_dir_is_empty(&dir));
}

#[tokio::test]
async fn test_recognition_failure_maps_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let synthesizer = StubSynthesizer::ok();
    let pipeline = Pipeline::new(
        StubRecognizer::failing("tesseract exploded"),
        synthesizer.clone(),
        TransientStore::new(dir.path()),
        MAX_IMAGE_BYTES,
    );

    let err = pipeline.run(request(png_bytes())).await.unwrap_err();
    match err {
        PipelineError::Recognition(detail) => assert!(detail.contains("tesseract exploded")),
        other => panic!("expected Recognition, got {other:?}"),
    }
    assert_eq!(synthesizer.call_count(), 0);
    assert!(upload_dir_is_empty(&dir));
}

#[tokio::test]
async fn test_synthesis_failure_maps_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(
        StubRecognizer::returning("Readable text."),
        StubSynthesizer::failing(),
        TransientStore::new(dir.path()),
        MAX_IMAGE_BYTES,
    );

    let err = pipeline.run(request(png_bytes())).await.unwrap_err();
    assert!(matches!(err, PipelineError::Synthesis(_)));
    assert!(upload_dir_is_empty(&dir));
}

#[tokio::test]
async fn test_normalized_text_is_what_gets_spoken() {
    // The synthesizer must receive normalized text, not the raw OCR output.
    struct CapturingSynthesizer {
        spoken: std::sync::Mutex<Option<String>>,
    }

    #[async_trait]
    impl SpeechSynthesizer for CapturingSynthesizer {
        async fn synthesize(&self, text: &str, _language: &str) -> Result<Bytes> {
            *self.spoken.lock().unwrap() = Some(text.to_string());
            Ok(Bytes::from_static(b"mp3"))
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let synthesizer = Arc::new(CapturingSynthesizer {
        spoken: std::sync::Mutex::new(None),
    });
    let pipeline = Pipeline::new(
        StubRecognizer::returning("line one\nline two"),
        synthesizer.clone(),
        TransientStore::new(dir.path()),
        MAX_IMAGE_BYTES,
    );

    pipeline.run(request(png_bytes())).await.unwrap();
    assert_eq!(
        synthesizer.spoken.lock().unwrap().as_deref(),
        Some("line one. line two")
    );
}

#[tokio::test]
async fn test_concurrent_requests_keep_isolated_uploads() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Arc::new(Pipeline::new(
        StubRecognizer::returning("Some text."),
        StubSynthesizer::ok(),
        TransientStore::new(dir.path()),
        MAX_IMAGE_BYTES,
    ));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let pipeline = Arc::clone(&pipeline);
        handles.push(tokio::spawn(async move {
            pipeline.run(request(png_bytes())).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert!(upload_dir_is_empty(&dir));
}
