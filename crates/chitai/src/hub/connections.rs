//! Registry of connected parties and their outbound channels.

use std::collections::BTreeMap;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

use chitai_protocol::{Role, ServerMessage};

/// Identifier assigned to a connection when it registers.
pub type ConnectionId = u64;

#[derive(Debug)]
struct Connection {
    role: Role,
    outbound: mpsc::Sender<ServerMessage>,
}

/// Connections owned by the session actor.
///
/// Sends never wait: a connection whose outbound buffer is full or closed is
/// dropped from the registry, which closes its writer.
#[derive(Debug, Default)]
pub struct Connections {
    next_id: ConnectionId,
    entries: BTreeMap<ConnectionId, Connection>,
}

impl Connections {
    pub fn register(&mut self, role: Role, outbound: mpsc::Sender<ServerMessage>) -> ConnectionId {
        self.next_id += 1;
        let id = self.next_id;
        self.entries.insert(id, Connection { role, outbound });
        id
    }

    /// Remove a connection. Returns false if it was already gone.
    pub fn remove(&mut self, id: ConnectionId) -> bool {
        self.entries.remove(&id).is_some()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Send to one connection, dropping it if the send fails.
    pub fn send_to(&mut self, id: ConnectionId, message: ServerMessage) -> bool {
        let Some(connection) = self.entries.get(&id) else {
            return false;
        };
        match connection.outbound.try_send(message) {
            Ok(()) => true,
            Err(e) => {
                self.drop_failed(id, &e);
                false
            }
        }
    }

    /// Send to every connection. Returns how many received the message.
    pub fn broadcast(&mut self, message: &ServerMessage) -> usize {
        let mut failed = Vec::new();
        let mut delivered = 0;
        for (id, connection) in &self.entries {
            match connection.outbound.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => failed.push((*id, e)),
            }
        }
        for (id, e) in failed {
            self.drop_failed(id, &e);
        }
        delivered
    }

    fn drop_failed(&mut self, id: ConnectionId, error: &TrySendError<ServerMessage>) {
        if let Some(connection) = self.entries.remove(&id) {
            let reason = match error {
                TrySendError::Full(_) => "outbound buffer full",
                TrySendError::Closed(_) => "outbound channel closed",
            };
            debug!(connection_id = id, role = %connection.role, reason, "Dropping connection");
        }
    }
}
