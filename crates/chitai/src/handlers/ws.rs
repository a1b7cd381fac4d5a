use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::Response;
use serde::Deserialize;

use chitai_protocol::Role;

use crate::hub::serve_socket;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub role: Role,
}

/// GET /ws?role=controller|display|observer
///
/// An unknown or missing role is rejected by the query extractor with 400.
pub async fn ws_upgrade(
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Response {
    let session = state.session.clone();
    ws.on_upgrade(move |socket| serve_socket(socket, params.role, session))
}
