use anyhow::{Context, Result};
use snapvoice::config::AppConfig;
use snapvoice::pipeline::Pipeline;
use snapvoice::recognition::TesseractRecognizer;
use snapvoice::server::{router, AppState};
use snapvoice::storage::TransientStore;
use snapvoice::synthesis::GoogleTranslateTts;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;
    config.validate().context("Configuration validation failed")?;
    info!("Configuration validated successfully");

    let store = TransientStore::new(&config.storage.upload_dir);
    store
        .ensure_root()
        .with_context(|| format!("Failed to create upload directory {}", config.storage.upload_dir))?;

    let recognizer = Arc::new(TesseractRecognizer::new(config.ocr.clone()));
    let synthesizer = Arc::new(GoogleTranslateTts::new(&config.tts)?);
    let pipeline = Pipeline::new(
        recognizer,
        synthesizer,
        store,
        config.storage.max_image_bytes,
    );

    let state = AppState {
        pipeline: Arc::new(pipeline),
    };
    let app = router(state, config.server.max_body_bytes);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_address))?;
    info!("Listening on {}", config.server.bind_address);

    axum::serve(listener, app).await?;
    Ok(())
}
