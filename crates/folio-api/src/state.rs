//! Application state shared across all route handlers.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use folio_chat::ConversationRouter;
use folio_core::config::FolioConfig;
use folio_session::SessionManager;
use folio_vector::{DocumentProcessor, SharedEmbedder};

/// Shared application state.
///
/// Cloned into every handler task; all services sit behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration. Read-only after startup.
    pub config: Arc<FolioConfig>,
    /// Session lifecycle (cache, locks, durable store).
    pub sessions: Arc<SessionManager>,
    /// Chat message router.
    pub router: Arc<ConversationRouter>,
    /// Document extraction and chunking.
    pub processor: Arc<DocumentProcessor>,
    /// Scratch directory for uploads in flight.
    pub upload_dir: PathBuf,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Assemble the state. Uploads are staged under `<data_dir>/uploads`.
    pub fn new(config: FolioConfig, router: ConversationRouter, processor: DocumentProcessor) -> Self {
        let upload_dir = config.data_dir().join("uploads");
        Self {
            sessions: Arc::clone(router.sessions()),
            config: Arc::new(config),
            router: Arc::new(router),
            processor: Arc::new(processor),
            upload_dir,
            start_time: Instant::now(),
        }
    }

    /// Embedder used both to build new indexes and to reload stored ones.
    pub fn embedder(&self) -> &SharedEmbedder {
        self.sessions.store().embedder()
    }
}
