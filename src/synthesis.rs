//! # Synthesis Adapter
//!
//! Turns normalized text into MP3 audio through the Google Translate TTS
//! endpoint (the same backend the gTTS library wraps). The endpoint accepts
//! short text fragments only, so input is chunked on word boundaries and the
//! returned MP3 segments are concatenated; MP3 frames are self-contained, so
//! plain byte concatenation yields a playable stream.
//!
//! Unlike recognition there is no language fallback here: an invalid target
//! speech language is a caller error, not a transient condition.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::TtsConfig;

/// Longest text fragment sent to the engine in one request, in characters.
pub const MAX_CHUNK_CHARS: usize = 200;

/// MIME type of the synthesized audio.
pub const AUDIO_MIME: &str = "audio/mpeg";

/// Synthesizes speech audio from text in a requested language.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, language: &str) -> Result<Bytes>;
}

/// [`SpeechSynthesizer`] backed by the Google Translate TTS endpoint.
pub struct GoogleTranslateTts {
    client: Client,
    endpoint: String,
}

impl GoogleTranslateTts {
    pub fn new(config: &TtsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build TTS HTTP client")?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleTranslateTts {
    async fn synthesize(&self, text: &str, language: &str) -> Result<Bytes> {
        let chunks = split_into_chunks(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            bail!("No synthesizable text");
        }

        let mut audio: Vec<u8> = Vec::new();
        for (index, chunk) in chunks.iter().enumerate() {
            let query: Vec<(&str, String)> = vec![
                ("ie", "UTF-8".to_string()),
                ("client", "tw-ob".to_string()),
                ("tl", language.to_string()),
                ("q", chunk.clone()),
                ("idx", index.to_string()),
                ("total", chunks.len().to_string()),
                ("textlen", chunk.chars().count().to_string()),
            ];

            let response = self
                .client
                .get(&self.endpoint)
                .query(&query)
                .send()
                .await
                .context("TTS engine unreachable")?;

            // The endpoint answers 404 for unknown language tags.
            if !response.status().is_success() {
                bail!(
                    "TTS engine rejected chunk {} of {} with status {} (language '{}')",
                    index + 1,
                    chunks.len(),
                    response.status(),
                    language
                );
            }

            let segment = response
                .bytes()
                .await
                .context("Failed to read TTS engine response body")?;
            debug!(
                chunk = index + 1,
                chunk_chars = chunk.chars().count(),
                segment_bytes = segment.len(),
                "Synthesized audio segment"
            );
            audio.extend_from_slice(&segment);
        }

        if audio.is_empty() {
            bail!("TTS engine returned no audio");
        }

        info!(
            "Synthesized {} characters into {} bytes of audio across {} chunks",
            text.chars().count(),
            audio.len(),
            chunks.len()
        );
        Ok(Bytes::from(audio))
    }
}

/// Split text into fragments of at most `max_chars` characters, preferring
/// word boundaries. A single word longer than the limit is hard-split.
pub(crate) fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;

    for word in text.split_whitespace() {
        let word_chars = word.chars().count();

        if word_chars > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_chars = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        let separator = usize::from(!current.is_empty());
        if current_chars + separator + word_chars > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_chars = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_chars += 1;
        }
        current.push_str(word);
        current_chars += word_chars;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
