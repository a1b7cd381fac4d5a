//! Chitai: a live reading-session server.
//!
//! One in-memory session is shared by every connected party (a controller
//! feeding text, a display rendering it, observers following along). Each
//! change is written to the record store, then broadcast as a full state
//! snapshot over WebSocket.

pub mod build_info;
pub mod config;
pub mod handlers;
pub mod hub;
pub mod language;
pub mod server;
pub mod session;
pub mod store;
