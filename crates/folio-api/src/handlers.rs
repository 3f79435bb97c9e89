//! Route handler functions for all API endpoints.
//!
//! Each handler extracts path, query, body or multipart input, calls into
//! the session and chat services on AppState, and returns JSON.

use std::io::Write;
use std::path::Path as FsPath;

use axum::extract::{Multipart, Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use folio_core::error::FolioError;
use folio_core::types::{Message, SessionId};
use folio_vector::SemanticIndex;

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: String,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub session_id: String,
    /// Display name of every document now attached to the session.
    pub filename: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&Message> for HistoryEntry {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role.to_string(),
            content: msg.content.clone(),
            timestamp: msg.timestamp,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub history: Vec<HistoryEntry>,
    pub filename: String,
    pub has_index: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub active_sessions: u64,
}

// =============================================================================
// Handlers
// =============================================================================

/// POST /upload - attach a document to a session, creating it if needed.
///
/// Expects a multipart `file` field. The bytes are staged in a temp file
/// that is removed when this handler returns, whatever the outcome.
pub async fn upload(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let session_id = match params.session_id.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => SessionId::parse(raw)?,
        _ => SessionId::generate(),
    };

    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .and_then(display_name)
            .ok_or_else(|| ApiError::BadRequest("'file' must carry a filename".to_string()))?;
        let bytes = field.bytes().await?;
        upload = Some((filename, bytes.to_vec()));
    }
    let (filename, bytes) =
        upload.ok_or_else(|| ApiError::BadRequest("missing multipart field 'file'".to_string()))?;

    if !state.processor.supports(&filename) {
        return Err(ApiError::BadRequest(format!(
            "Unsupported document type: {}",
            filename
        )));
    }

    let fragments = {
        let staged = stage_upload(&state.upload_dir, &bytes)?;
        state.processor.extract_file(staged.path(), &filename)?
    };

    info!(
        session = %session_id.short(),
        filename = %filename,
        fragments = fragments.len(),
        "Document extracted"
    );

    let index = SemanticIndex::build(fragments, state.embedder().clone()).await?;
    let session = state
        .sessions
        .attach_document(&session_id, index, &filename)
        .await?;

    Ok(Json(UploadResponse {
        session_id: session.id.to_string(),
        filename: session.filename,
    }))
}

/// POST /chat - answer a message. Degraded answers are still 200s.
pub async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let session_id = SessionId::parse(&body.session_id)?;
    let response = state.router.handle_message(&session_id, &body.message).await;

    Ok(Json(ChatResponse {
        response,
        session_id: session_id.to_string(),
    }))
}

/// GET /chat-history/{session_id}
pub async fn chat_history(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let session_id = SessionId::parse(&raw_id)?;
    let session = state
        .sessions
        .get(&session_id)
        .await?
        .ok_or_else(|| FolioError::NotFound("Session not found".to_string()))?;

    Ok(Json(HistoryResponse {
        history: session.chat_history.iter().map(HistoryEntry::from).collect(),
        has_index: session.has_index(),
        filename: session.filename,
    }))
}

/// DELETE /sessions/{session_id} - idempotent.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let session_id = SessionId::parse(&raw_id)?;
    state.sessions.delete(&session_id).await?;
    Ok(Json(DeleteResponse { success: true }))
}

/// GET /health - health check.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_sessions: state.sessions.active_sessions().await as u64,
    })
}

// =============================================================================
// Helpers
// =============================================================================

/// Strip any client-supplied directory components from an upload name.
fn display_name(raw: &str) -> Option<String> {
    let name = raw.rsplit(['/', '\\']).next()?.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Write upload bytes to a temp file under `dir`.
fn stage_upload(dir: &FsPath, bytes: &[u8]) -> Result<tempfile::NamedTempFile, FolioError> {
    std::fs::create_dir_all(dir)?;
    let mut staged = tempfile::Builder::new()
        .prefix("upload-")
        .tempfile_in(dir)?;
    staged.write_all(bytes)?;
    staged.flush()?;
    if let Err(e) = staged.as_file().sync_all() {
        warn!(error = %e, "Failed to sync staged upload");
    }
    Ok(staged)
}
