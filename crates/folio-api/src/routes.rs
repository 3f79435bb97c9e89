//! Router setup with all API routes and middleware.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use folio_core::config::FolioConfig;
use folio_core::error::FolioError;

use crate::handlers;
use crate::state::AppState;

/// Multipart framing allowance on top of the configured upload size.
const UPLOAD_OVERHEAD_BYTES: usize = 64 * 1024;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let upload_limit = state
        .config
        .storage
        .max_upload_mb
        .saturating_mul(1024 * 1024)
        .saturating_add(UPLOAD_OVERHEAD_BYTES);

    let upload_routes = Router::new()
        .route("/upload", post(handlers::upload))
        // Older clients post to the PDF-specific path.
        .route("/upload-pdf", post(handlers::upload))
        .layer(DefaultBodyLimit::max(upload_limit));

    let routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/chat", post(handlers::chat))
        .route("/chat-history/{session_id}", get(handlers::chat_history))
        .route("/sessions/{session_id}", delete(handlers::delete_session))
        .layer(DefaultBodyLimit::max(1024 * 1024));

    routes
        .merge(upload_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.general.allowed_origins))
        .with_state(state)
}

/// CORS restricted to the configured origins. Unparseable entries are
/// skipped with a warning.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
}

/// Start the HTTP server on the configured port.
pub async fn start_server(config: &FolioConfig, state: AppState) -> Result<(), FolioError> {
    let addr = format!("0.0.0.0:{}", config.general.port);
    let router = create_router(state);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| FolioError::Config(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, router).await?;

    Ok(())
}
