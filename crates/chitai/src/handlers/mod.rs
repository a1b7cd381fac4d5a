//! HTTP request handlers.

mod health;
mod logs;
mod version;
mod ws;

pub use health::{ReadyzResponse, livez, readyz};
pub use logs::{FrontendLevel, LogMessage, receive_frontend_log};
pub use version::version;
pub use ws::{WsParams, ws_upgrade};
