//! Integration tests for the Folio API.
//!
//! Every test builds its own state over a temporary data directory, a mock
//! embedder and a mock completion service, then drives the router with
//! `oneshot`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use folio_api::error::ErrorBody;
use folio_api::handlers::{
    ChatResponse, DeleteResponse, HealthResponse, HistoryResponse, UploadResponse,
};
use folio_api::{create_router, AppState};
use folio_chat::router::EMPTY_MESSAGE_REPLY;
use folio_chat::{ConversationRouter, MockCompletion, RouterSettings, SharedCompletion};
use folio_core::config::FolioConfig;
use folio_core::types::SessionId;
use folio_session::SessionManager;
use folio_storage::SessionStore;
use folio_vector::{DocumentProcessor, MockEmbedding};

// =============================================================================
// Helpers
// =============================================================================

const BOUNDARY: &str = "folio-test-boundary";

struct TestApp {
    state: AppState,
    completion: Arc<MockCompletion>,
    _dir: TempDir,
}

impl TestApp {
    fn new() -> Self {
        Self::with_config(|_| {})
    }

    fn with_config(adjust: impl FnOnce(&mut FolioConfig)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = FolioConfig::default();
        config.general.data_dir = dir.path().to_string_lossy().into_owned();
        adjust(&mut config);

        let store = SessionStore::open(&config.data_dir(), Arc::new(MockEmbedding::new())).unwrap();
        let sessions = Arc::new(SessionManager::new(Arc::new(store)));
        let completion = Arc::new(MockCompletion::replying("mock reply"));
        let router = ConversationRouter::new(
            sessions,
            completion.clone() as SharedCompletion,
            RouterSettings::from(&config),
        );
        let state = AppState::new(config, router, DocumentProcessor::default());

        Self {
            state,
            completion,
            _dir: dir,
        }
    }

    async fn send(&self, req: Request<Body>) -> axum::response::Response {
        create_router(self.state.clone()).oneshot(req).await.unwrap()
    }
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::delete(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, json: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

fn chat(session_id: &str, message: &str) -> Request<Body> {
    post_json(
        "/chat",
        serde_json::json!({ "session_id": session_id, "message": message }),
    )
}

/// Multipart request with a single `file` field.
fn upload(uri: &str, filename: &str, content: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::post(uri)
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap()
}

/// A one-page PDF showing `text` in Helvetica.
fn pdf_with_text(text: &str) -> Vec<u8> {
    let content = format!("BT /F1 12 Tf 72 720 Td ({text}) Tj ET");
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R \
         /Resources << /Font << /F1 5 0 R >> >> >>"
            .to_string(),
        format!("<< /Length {} >>\nstream\n{content}\nendstream", content.len()),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
    ];

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", i + 1).as_bytes());
    }
    let xref = pdf.len();
    let size = objects.len() + 1;
    pdf.extend_from_slice(format!("xref\n0 {size}\n0000000000 65535 f \n").as_bytes());
    for offset in offsets {
        pdf.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    pdf.extend_from_slice(
        format!("trailer\n<< /Size {size} /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n").as_bytes(),
    );
    pdf
}

async fn json_body<T: serde::de::DeserializeOwned>(resp: axum::response::Response) -> T {
    let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let resp = app.send(get("/health")).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let health: HealthResponse = json_body(resp).await;
    assert_eq!(health.status, "healthy");
    assert_eq!(health.active_sessions, 0);
}

// =============================================================================
// Chat and history
// =============================================================================

#[tokio::test]
async fn test_chat_creates_session_and_records_history() {
    let app = TestApp::new();

    let resp = app.send(chat("abc-123", "hello")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let reply: ChatResponse = json_body(resp).await;
    assert_eq!(reply.response, "mock reply");
    assert_eq!(reply.session_id, "abc-123");

    let resp = app.send(get("/chat-history/abc-123")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let history: HistoryResponse = json_body(resp).await;
    assert_eq!(history.filename, "General Chat");
    assert!(!history.has_index);
    assert_eq!(history.history.len(), 2);
    assert_eq!(history.history[0].role, "user");
    assert_eq!(history.history[0].content, "hello");
    assert_eq!(history.history[1].role, "assistant");
    assert_eq!(history.history[1].content, "mock reply");
}

#[tokio::test]
async fn test_chat_empty_message_is_guidance_not_error() {
    let app = TestApp::new();

    let resp = app.send(chat("quiet", "   ")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let reply: ChatResponse = json_body(resp).await;
    assert_eq!(reply.response, EMPTY_MESSAGE_REPLY);
    assert_eq!(app.completion.calls(), 0);

    // Invalid input never creates a session.
    let resp = app.send(get("/chat-history/quiet")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_chat_rejects_invalid_session_id() {
    let app = TestApp::new();
    let resp = app.send(chat("../etc/passwd", "hello")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let err: ErrorBody = json_body(resp).await;
    assert_eq!(err.error, "bad_request");
}

#[tokio::test]
async fn test_chat_missing_fields_rejected() {
    let app = TestApp::new();
    let resp = app
        .send(post_json("/chat", serde_json::json!({ "message": "hi there" })))
        .await;
    assert!(resp.status().is_client_error());
}

#[tokio::test]
async fn test_history_unknown_session() {
    let app = TestApp::new();
    let resp = app.send(get("/chat-history/nobody")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let err: ErrorBody = json_body(resp).await;
    assert_eq!(err.error, "not_found");
}

// =============================================================================
// Deletion
// =============================================================================

#[tokio::test]
async fn test_delete_unknown_session_is_success() {
    let app = TestApp::new();
    let resp = app.send(delete("/sessions/ghost")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: DeleteResponse = json_body(resp).await;
    assert!(body.success);
}

#[tokio::test]
async fn test_delete_removes_session() {
    let app = TestApp::new();
    app.send(chat("doomed", "hello")).await;

    let resp = app.send(delete("/sessions/doomed")).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app.send(get("/chat-history/doomed")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let id = SessionId::parse("doomed").unwrap();
    assert!(!app.state.sessions.store().exists(&id).unwrap());
}

// =============================================================================
// Upload
// =============================================================================

#[tokio::test]
async fn test_upload_creates_session_with_index() {
    let app = TestApp::new();
    let resp = app
        .send(upload("/upload", "notes.txt", b"Refunds are processed within 14 days."))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: UploadResponse = json_body(resp).await;
    assert_eq!(body.filename, "notes.txt");
    assert!(!body.session_id.is_empty());

    let resp = app
        .send(get(&format!("/chat-history/{}", body.session_id)))
        .await;
    let history: HistoryResponse = json_body(resp).await;
    assert!(history.has_index);
    assert!(history.history.is_empty());
    assert_eq!(history.filename, "notes.txt");
}

#[tokio::test]
async fn test_upload_merges_and_dedups_filenames() {
    let app = TestApp::new();

    app.send(upload("/upload?session_id=s1", "x.md", b"# Shipping\nOrders ship daily."))
        .await;
    app.send(upload("/upload?session_id=s1", "a.txt", b"Refunds take two weeks."))
        .await;
    let resp = app
        .send(upload("/upload?session_id=s1", "a.txt", b"Refunds take two weeks."))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: UploadResponse = json_body(resp).await;
    assert_eq!(body.session_id, "s1");
    assert_eq!(body.filename, "a.txt, x.md");
}

#[tokio::test]
async fn test_upload_pdf_alias() {
    let app = TestApp::new();
    let resp = app
        .send(upload("/upload-pdf?session_id=legacy", "readme.md", b"legacy path works"))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: UploadResponse = json_body(resp).await;
    assert_eq!(body.session_id, "legacy");
}

#[tokio::test]
async fn test_upload_rejects_unsupported_type() {
    let app = TestApp::new();
    let resp = app.send(upload("/upload", "report.docx", b"PK\x03\x04")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_pdf_builds_index() {
    let app = TestApp::new();
    let resp = app
        .send(upload(
            "/upload-pdf?session_id=manual",
            "policy.pdf",
            &pdf_with_text("Refunds are processed within 14 days"),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: UploadResponse = json_body(resp).await;
    assert_eq!(body.filename, "policy.pdf");

    let resp = app.send(get("/chat-history/manual")).await;
    let history: HistoryResponse = json_body(resp).await;
    assert!(history.has_index);
    assert_eq!(history.filename, "policy.pdf");
}

#[tokio::test]
async fn test_upload_unreadable_pdf() {
    let app = TestApp::new();
    let resp = app
        .send(upload("/upload?session_id=broken", "broken.pdf", b"%PDF-1.4\nnot really"))
        .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let resp = app.send(get("/chat-history/broken")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_empty_document() {
    let app = TestApp::new();
    let resp = app
        .send(upload("/upload?session_id=blank", "empty.txt", b"  \n\n "))
        .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // A failed upload leaves no session behind.
    let resp = app.send(get("/chat-history/blank")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_missing_file_field() {
    let app = TestApp::new();
    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"other\"\r\n\r\nvalue\r\n--{BOUNDARY}--\r\n"
    );
    let req = Request::post("/upload")
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap();
    let resp = app.send(req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_size_limit() {
    let app = TestApp::with_config(|c| c.storage.max_upload_mb = 0);
    let big = vec![b'a'; 256 * 1024];
    let resp = app.send(upload("/upload", "big.txt", &big)).await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_upload_cleans_staging_files() {
    let app = TestApp::new();
    app.send(upload("/upload", "ok.txt", b"some content here")).await;
    app.send(upload("/upload", "empty.txt", b"")).await;

    let staged: Vec<_> = std::fs::read_dir(&app.state.upload_dir)
        .unwrap()
        .collect();
    assert!(staged.is_empty());
}

#[tokio::test]
async fn test_document_question_uses_uploaded_text() {
    let app = TestApp::new();
    app.send(upload(
        "/upload?session_id=docs",
        "policy.txt",
        b"Refunds are processed within 14 days of the request.",
    ))
    .await;

    let resp = app
        .send(chat("docs", "according to the document, how long do refunds take?"))
        .await;
    let reply: ChatResponse = json_body(resp).await;
    assert_eq!(reply.response, "mock reply");

    let prompts = app.completion.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Context from policy.txt"));
    assert!(prompts[0].contains("Refunds are processed within 14 days"));
}

// =============================================================================
// CORS
// =============================================================================

#[tokio::test]
async fn test_cors_allows_configured_origin() {
    let app = TestApp::new();
    let req = Request::builder()
        .method("OPTIONS")
        .uri("/chat")
        .header("origin", "http://localhost:3000")
        .header("access-control-request-method", "POST")
        .body(Body::empty())
        .unwrap();
    let resp = app.send(req).await;
    assert_eq!(
        resp.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("http://localhost:3000")
    );
}

#[tokio::test]
async fn test_cors_ignores_unknown_origin() {
    let app = TestApp::new();
    let req = Request::get("/health")
        .header("origin", "http://evil.example")
        .body(Body::empty())
        .unwrap();
    let resp = app.send(req).await;
    assert!(resp.headers().get("access-control-allow-origin").is_none());
}
