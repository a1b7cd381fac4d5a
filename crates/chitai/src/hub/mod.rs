//! Connection hub: WebSocket connections in, state snapshots out.
//!
//! Each socket gets a writer task fed by a bounded channel registered with the
//! session actor, and a reader loop that parses frames into
//! [`ClientMessage`](chitai_protocol::ClientMessage)s and dispatches them.

mod connections;
mod socket;

pub use connections::{ConnectionId, Connections};
pub use socket::serve_socket;
