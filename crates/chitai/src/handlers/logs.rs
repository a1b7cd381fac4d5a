//! Relay of browser console output into the server log.

use axum::Json;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrontendLevel {
    #[default]
    Log,
    Debug,
    Info,
    Warn,
    Error,
}

/// One console call forwarded by a presentation page.
#[derive(Debug, Deserialize)]
pub struct LogMessage {
    #[serde(default)]
    pub level: FrontendLevel,
    pub message: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

/// POST /api/logs
pub async fn receive_frontend_log(Json(log): Json<LogMessage>) -> Json<Value> {
    let args = if log.args.is_empty() {
        String::new()
    } else {
        Value::Array(log.args).to_string()
    };
    let text = log.message.as_str();

    match log.level {
        FrontendLevel::Error => error!(source = "frontend", text, args, "Frontend log"),
        FrontendLevel::Warn => warn!(source = "frontend", text, args, "Frontend log"),
        FrontendLevel::Info => info!(source = "frontend", text, args, "Frontend log"),
        FrontendLevel::Log | FrontendLevel::Debug => {
            debug!(source = "frontend", text, args, "Frontend log")
        }
    }

    Json(json!({ "status": "ok" }))
}
