//! Folio application binary - composition root.
//!
//! 1. Parse CLI flags and load configuration from TOML
//! 2. Pick an embedder (ONNX when a model directory is configured)
//! 3. Open the session store and build the chat router
//! 4. Start the expiry sweep on its own timer
//! 5. Serve the HTTP API

mod cli;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use folio_api::AppState;
use folio_chat::{ConversationRouter, OllamaCompletion, RouterSettings, SharedCompletion};
use folio_core::config::{expand_home, FolioConfig, RetrievalConfig};
use folio_session::SessionManager;
use folio_storage::SessionStore;
use folio_vector::{DocumentProcessor, MockEmbedding, OnnxEmbeddingService, SharedEmbedder, TextSplitter};

use cli::CliArgs;

/// Build the embedder. Falls back to the mock when the ONNX model cannot
/// be loaded so that general chat keeps working.
fn build_embedder(retrieval: &RetrievalConfig) -> SharedEmbedder {
    let Some(dir) = retrieval.model_dir.as_deref() else {
        tracing::warn!("No embedding model configured; using mock embeddings");
        return Arc::new(MockEmbedding::new());
    };

    let dir = expand_home(dir);
    match OnnxEmbeddingService::from_directory(&dir, &retrieval.embedding_model) {
        Ok(service) => {
            tracing::info!(model = %retrieval.embedding_model, dir = %dir.display(), "ONNX embedder loaded");
            Arc::new(service)
        }
        Err(e) => {
            tracing::error!(dir = %dir.display(), error = %e, "Failed to load ONNX model; using mock embeddings");
            Arc::new(MockEmbedding::new())
        }
    }
}

/// Periodically delete sessions idle past the retention window.
async fn sweep_loop(sessions: Arc<SessionManager>, interval_hours: u32, max_age_days: u32) {
    let period = Duration::from_secs(u64::from(interval_hours.max(1)) * 3600);
    let max_age = chrono::Duration::days(i64::from(max_age_days));
    let mut interval = tokio::time::interval(period);

    tracing::info!(interval_hours, max_age_days, "Expiry sweep scheduled");

    loop {
        interval.tick().await;
        match sessions.sweep_expired(max_age).await {
            Ok(swept) if !swept.is_empty() => {
                tracing::info!(count = swept.len(), "Expired sessions removed");
            }
            Ok(_) => tracing::debug!("No expired sessions"),
            Err(e) => tracing::error!(error = %e, "Expiry sweep failed"),
        }
    }
}

fn load_config(args: &CliArgs, path: &Path) -> FolioConfig {
    let mut config = FolioConfig::load_or_default(path);
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    if let Some(level) = args.resolve_log_level() {
        config.general.log_level = level;
    }
    config.general.port = args.resolve_port(config.general.port);
    config
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();
    let config_file = args.resolve_config_path();
    let config = load_config(&args, &config_file);

    // RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting Folio v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration resolved");

    let data_dir = config.data_dir();
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }

    // Storage and sessions.
    let embedder = build_embedder(&config.retrieval);
    let store = SessionStore::open(&data_dir, embedder)?;
    tracing::info!(path = %data_dir.display(), sessions = store.count()?, "Session store opened");
    let sessions = Arc::new(SessionManager::new(Arc::new(store)));

    // Chat.
    let completion: SharedCompletion = Arc::new(OllamaCompletion::new(&config.chat)?);
    tracing::info!(model = %config.chat.model, endpoint = %config.chat.endpoint, "Completion backend configured");
    let router = ConversationRouter::new(
        Arc::clone(&sessions),
        completion,
        RouterSettings::from(&config),
    );

    let processor = DocumentProcessor::new(TextSplitter::new(
        config.retrieval.chunk_size,
        config.retrieval.chunk_overlap,
    ));

    // Background expiry sweep.
    let sweep_sessions = Arc::clone(&sessions);
    let interval_hours = config.storage.sweep_interval_hours;
    let max_age_days = config.storage.max_age_days;
    tokio::spawn(async move {
        sweep_loop(sweep_sessions, interval_hours, max_age_days).await;
    });

    // API server.
    let state = AppState::new(config.clone(), router, processor);
    if let Err(e) = folio_api::start_server(&config, state).await {
        tracing::error!(port = config.general.port, error = %e, "API server stopped");
        return Err(e.into());
    }

    Ok(())
}
