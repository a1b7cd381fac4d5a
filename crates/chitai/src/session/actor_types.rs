//! Session actor types and protocol.
//!
//! This module defines the command protocol for communicating with the session
//! actor, along with configuration and error types.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use chitai_protocol::{ClientMessage, Language, Role, ServerMessage, StatePayload};

use crate::hub::ConnectionId;
use crate::store::{ItemResolver, PersistenceGateway};

// ============================================================================
// Session Command
// ============================================================================

/// Commands that can be sent to the session actor.
pub enum SessionCommand {
    // Connections
    Connect {
        role: Role,
        outbound: mpsc::Sender<ServerMessage>,
        reply: oneshot::Sender<ConnectionId>,
    },
    Disconnect {
        connection_id: ConnectionId,
    },

    // Protocol
    Inbound {
        connection_id: ConnectionId,
        message: ClientMessage,
    },

    // Read operations
    GetState {
        reply: oneshot::Sender<StatePayload>,
    },
    ConnectionCount {
        reply: oneshot::Sender<usize>,
    },
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors from actor operations.
#[derive(Debug, Error)]
pub enum ActorError {
    /// The actor has shut down.
    #[error("actor has shut down")]
    ActorShutdown,
}

// ============================================================================
// Configuration
// ============================================================================

/// Channel capacity for session commands.
pub const CHANNEL_CAPACITY: usize = 256;

/// Per-connection outbound buffer. A connection that falls this far behind
/// is dropped.
pub const OUTBOUND_CAPACITY: usize = 64;

/// Configuration for spawning the session actor.
pub struct ActorConfig {
    pub resolver: Arc<dyn ItemResolver>,
    pub gateway: Arc<dyn PersistenceGateway>,
    pub grace_period: Duration,
    pub default_language: Language,
}
