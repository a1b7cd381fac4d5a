//! Per-connection WebSocket loop.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use chitai_protocol::{ClientMessage, Role, ServerMessage};

use crate::session::{OUTBOUND_CAPACITY, SessionHandle};

/// Serve one upgraded WebSocket until either side closes it.
///
/// Outbound messages flow from the session actor through a bounded channel
/// to a writer task. Inbound frames are parsed here; frames that are not a
/// valid [`ClientMessage`] are logged and dropped before reaching the actor.
pub async fn serve_socket(socket: WebSocket, role: Role, session: SessionHandle) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<ServerMessage>(OUTBOUND_CAPACITY);

    let connection_id = match session.connect(role, outbound_tx).await {
        Ok(id) => id,
        Err(e) => {
            warn!(%role, error = %e, "Rejecting connection");
            let _ = ws_tx.close().await;
            return;
        }
    };
    info!(connection_id, %role, "WebSocket connection opened");

    // Ends when the actor drops this connection or the socket stops accepting.
    let mut send_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(e) => {
                    warn!(connection_id, error = %e, "Failed to serialize message");
                    continue;
                }
            };
            if ws_tx.send(Message::Text(json.into())).await.is_err() {
                debug!(connection_id, "WebSocket send failed, client disconnected");
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    loop {
        tokio::select! {
            _ = &mut send_task => {
                debug!(connection_id, "Writer finished");
                break;
            }

            frame = ws_rx.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        debug!(connection_id, error = %e, "WebSocket receive failed");
                        break;
                    }
                };

                match ClientMessage::parse(text.as_str()) {
                    Ok(message) => {
                        if session.dispatch(connection_id, message).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(connection_id, error = %e, "Dropping invalid client message");
                    }
                }
            }
        }
    }

    let _ = session.disconnect(connection_id).await;
    send_task.abort();
    info!(connection_id, %role, "WebSocket connection closed");
}
