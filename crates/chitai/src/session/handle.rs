//! Session handle for communicating with the session actor.
//!
//! `SessionHandle` is a thin wrapper around an `mpsc::Sender<SessionCommand>`.
//! It is cheap to clone and is shared by every connection.

use tokio::sync::{mpsc, oneshot};

use chitai_protocol::{ClientMessage, Role, ServerMessage, StatePayload};

use crate::hub::ConnectionId;

use super::actor_types::{ActorError, SessionCommand};

#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub(crate) fn new(tx: mpsc::Sender<SessionCommand>) -> Self {
        Self { tx }
    }

    // ------------------------------------------------------------------------
    // Connections
    // ------------------------------------------------------------------------

    /// Register a connection.
    ///
    /// The current state is pushed to `outbound` before this returns, so a
    /// new party needs no separate sync request.
    pub async fn connect(
        &self,
        role: Role,
        outbound: mpsc::Sender<ServerMessage>,
    ) -> Result<ConnectionId, ActorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SessionCommand::Connect {
            role,
            outbound,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| ActorError::ActorShutdown)
    }

    pub async fn disconnect(&self, connection_id: ConnectionId) -> Result<(), ActorError> {
        self.send(SessionCommand::Disconnect { connection_id }).await
    }

    // ------------------------------------------------------------------------
    // Protocol
    // ------------------------------------------------------------------------

    /// Queue an inbound message for processing.
    ///
    /// Messages are handled in the order they are dispatched. Results reach
    /// the connection as broadcasts or error messages.
    pub async fn dispatch(
        &self,
        connection_id: ConnectionId,
        message: ClientMessage,
    ) -> Result<(), ActorError> {
        self.send(SessionCommand::Inbound {
            connection_id,
            message,
        })
        .await
    }

    // ------------------------------------------------------------------------
    // Read Operations
    // ------------------------------------------------------------------------

    pub async fn state(&self) -> Result<StatePayload, ActorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SessionCommand::GetState { reply: reply_tx })
            .await?;
        reply_rx.await.map_err(|_| ActorError::ActorShutdown)
    }

    pub async fn connection_count(&self) -> Result<usize, ActorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SessionCommand::ConnectionCount { reply: reply_tx })
            .await?;
        reply_rx.await.map_err(|_| ActorError::ActorShutdown)
    }

    async fn send(&self, command: SessionCommand) -> Result<(), ActorError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| ActorError::ActorShutdown)
    }
}
