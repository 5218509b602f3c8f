use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ledgerlens_categorize::{Categorizer, CategoryTable, Validator};
use ledgerlens_engine::{process_folder, spawn_intake_watcher, ReceiptPipeline};
use ledgerlens_ocr::OcrBackend;
use ledgerlens_server::{create_router, AppState, Config};
use ledgerlens_storage::create_db;
use ledgerlens_vision::{GeminiProvider, OpenAiProvider, VisionProvider};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("ledgerlens.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    if let Some(parent) = config.storage.db_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let pool = create_db(&config.storage.db_path)
        .await
        .with_context(|| format!("opening {}", config.storage.db_path.display()))?;

    let table = match &config.categories.table_path {
        Some(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            CategoryTable::from_toml(&text)
                .with_context(|| format!("parsing {}", path.display()))?
        }
        None => CategoryTable::default(),
    };

    let mut pipeline = ReceiptPipeline::new(
        build_recognizer(),
        config.storage.attachments_dir.clone(),
    )
    .with_categorizer(Categorizer::new(table.clone()))
    .with_validator(Validator::new(table, config.validation.min_confidence))
    .with_max_upload_bytes(config.server.max_upload_bytes);

    match build_provider(&config) {
        Some(provider) => {
            info!(model = provider.model_name(), "vision analysis enabled");
            pipeline = pipeline.with_vision(provider);
        }
        None => info!("no vision provider configured, running OCR-only"),
    }

    let state = AppState { pool: pool.clone(), pipeline: Arc::new(pipeline) };

    // Watch-folder intake: process what is already there, then follow new drops.
    let _watcher = match &config.intake.watch_dir {
        Some(dir) => {
            tokio::fs::create_dir_all(dir).await?;
            let backlog =
                process_folder(state.pipeline.as_ref(), &pool, dir).await?;
            info!(count = backlog.len(), dir = %dir.display(), "processed watch-folder backlog");

            let (tx, mut rx) = mpsc::channel::<PathBuf>(64);
            let watcher = spawn_intake_watcher(dir, tx)?;
            let watch_pipeline = Arc::clone(&state.pipeline);
            let watch_pool = pool.clone();
            tokio::spawn(async move {
                while let Some(path) = rx.recv().await {
                    if let Err(err) = watch_pipeline.process_file(&watch_pool, &path).await {
                        warn!(path = %path.display(), %err, "watch-folder file skipped");
                    }
                }
            });
            Some(watcher)
        }
        None => None,
    };

    let router = create_router(state, config.server.max_upload_bytes);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!(%addr, "listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(feature = "tesseract")]
fn build_recognizer() -> Box<dyn OcrBackend> {
    Box::new(ledgerlens_ocr::recognizer::tesseract_backend::TesseractRecognizer::new(None, "eng"))
}

#[cfg(not(feature = "tesseract"))]
fn build_recognizer() -> Box<dyn OcrBackend> {
    warn!("built without the `tesseract` feature, OCR pass will return no text");
    Box::new(ledgerlens_ocr::MockRecognizer::empty())
}

fn build_provider(config: &Config) -> Option<Box<dyn VisionProvider>> {
    let api_key = config.vision_api_key();
    match config.vision.provider.as_str() {
        "gemini" if !api_key.is_empty() => {
            Some(Box::new(GeminiProvider::new(api_key, config.vision.model.clone())))
        }
        "openai" if !api_key.is_empty() => {
            Some(Box::new(OpenAiProvider::new(api_key, config.vision.model.clone())))
        }
        "gemini" | "openai" => {
            warn!(provider = %config.vision.provider, "no API key available, vision disabled");
            None
        }
        "none" => None,
        other => {
            warn!(provider = %other, "unknown vision provider, vision disabled");
            None
        }
    }
}
