//! Round-trip test against the real Tesseract engine and the real TTS
//! endpoint. Ignored by default: requires an installed tesseract with an
//! English tessdata pack, network access, and a sample image.
//!
//! Run with:
//! `SNAPVOICE_SAMPLE_IMAGE=/path/to/hello_world.png cargo test -- --ignored`
//!
//! The sample image should show the text "Hello, world." at 800px or wider.

use bytes::Bytes;
use std::sync::Arc;

use snapvoice::config::{OcrConfig, TtsConfig};
use snapvoice::pipeline::{Pipeline, SpeechRequest};
use snapvoice::recognition::TesseractRecognizer;
use snapvoice::storage::TransientStore;
use snapvoice::synthesis::GoogleTranslateTts;

#[tokio::test]
#[ignore]
async fn test_rendered_text_round_trips_to_audio() {
    let sample_path = match std::env::var("SNAPVOICE_SAMPLE_IMAGE") {
        Ok(path) => path,
        Err(_) => {
            eprintln!("SNAPVOICE_SAMPLE_IMAGE not set, skipping");
            return;
        }
    };
    let image = Bytes::from(std::fs::read(&sample_path).expect("sample image must be readable"));

    let dir = tempfile::tempdir().unwrap();
    let store = TransientStore::new(dir.path());
    let recognizer = Arc::new(TesseractRecognizer::new(OcrConfig::default()));
    let synthesizer = Arc::new(GoogleTranslateTts::new(&TtsConfig::default()).unwrap());
    let pipeline = Pipeline::new(recognizer, synthesizer, store, 10 * 1024 * 1024);

    let clip = pipeline
        .run(SpeechRequest {
            image,
            filename: "hello_world.png".to_string(),
            ocr_language: "eng".to_string(),
            tts_language: "en".to_string(),
        })
        .await
        .expect("round trip must produce audio");

    assert_eq!(clip.content_type, "audio/mpeg");
    assert!(!clip.audio.is_empty());
    assert!(clip.character_count > 0);
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}
