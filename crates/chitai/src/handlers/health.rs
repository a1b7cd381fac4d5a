use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::server::AppState;

pub async fn livez() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadyzResponse {
    pub status: String,
    pub session_active: bool,
    pub connections: usize,
}

/// Ready while the session actor answers.
pub async fn readyz(
    State(state): State<AppState>,
) -> Result<Json<ReadyzResponse>, (StatusCode, &'static str)> {
    let unavailable = |_| (StatusCode::SERVICE_UNAVAILABLE, "session actor unavailable");
    let snapshot = state.session.state().await.map_err(unavailable)?;
    let connections = state.session.connection_count().await.map_err(unavailable)?;

    Ok(Json(ReadyzResponse {
        status: "ok".to_string(),
        session_active: snapshot.session_id.is_some(),
        connections,
    }))
}
