use std::path::PathBuf;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;

use crate::handlers;
use crate::session::SessionHandle;

// ============================================================================
// Application State
// ============================================================================

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub session: SessionHandle,
    /// Static presentation pages served under `/web`.
    pub web_dir: Option<PathBuf>,
    pub max_connections: usize,
}

// ============================================================================
// Server Setup
// ============================================================================

pub fn build_app(state: AppState, request_timeout_seconds: u64) -> Router {
    let max_connections = state.max_connections;
    let web_dir = state.web_dir.clone();

    // WebSocket route - long-lived, no request timeout
    let ws_routes = Router::new()
        .route("/ws", get(handlers::ws_upgrade))
        .with_state(state.clone());

    // Plain HTTP routes - with request timeout
    let http_routes = Router::new()
        .route("/livez", get(handlers::livez))
        .route("/readyz", get(handlers::readyz))
        .route("/version", get(handlers::version))
        .route("/api/logs", post(handlers::receive_frontend_log))
        .with_state(state)
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(request_timeout_seconds),
        ))
        .layer(ConcurrencyLimitLayer::new(max_connections));

    let app = Router::new().merge(ws_routes).merge(http_routes);

    match web_dir {
        Some(dir) => app.nest_service("/web", ServeDir::new(dir)),
        None => app,
    }
}
