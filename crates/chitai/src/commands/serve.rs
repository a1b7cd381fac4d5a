//! HTTP server command implementation.

use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

use chitai::build_info;
use chitai::config::{self, Config};
use chitai::server::{self, AppState};
use chitai::session::{ActorConfig, SessionActor};
use chitai::store::RecordStore;

pub async fn run(
    config_path: &str,
    host_override: Option<IpAddr>,
    port_override: Option<u16>,
    data_dir_override: Option<&Path>,
) -> Result<()> {
    let mut config = Config::load(config_path).await?;

    // CLI overrides config
    if let Some(host) = host_override {
        config.server.host = host.to_string();
    }
    if let Some(port) = port_override {
        config.server.port = port;
    }

    let store = match super::data_dir(config_path, &config, data_dir_override) {
        Some(dir) => {
            let store = RecordStore::open(&dir)
                .await
                .with_context(|| format!("Failed to open records in {}", dir.display()))?;
            info!(path = %dir.display(), "Using record journal");
            store
        }
        None => {
            warn!("No storage path configured, records are kept in memory only");
            RecordStore::in_memory()
        }
    };
    let store = Arc::new(store);

    let config_path_ref = Path::new(config_path);
    let web_dir = match &config.web.dir {
        Some(dir) => Some(config::resolve_path(config_path_ref, dir)),
        None => {
            let default = config::resolve_path(config_path_ref, Path::new(config::DEFAULT_WEB_DIR));
            default.is_dir().then_some(default)
        }
    };

    // Session actor
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (session, actor_task) = SessionActor::spawn(
        ActorConfig {
            resolver: store.clone(),
            gateway: store.clone(),
            grace_period: config.session.grace_period(),
            default_language: config.session.default_language,
        },
        shutdown_rx,
    );

    let state = AppState {
        session,
        web_dir,
        max_connections: config.server.max_connections,
    };
    let app = server::build_app(state, config.server.request_timeout_seconds);

    let ip: IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::new(ip, config.server.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(
        addr = %addr,
        version = %build_info::version_string(),
        grace_period_secs = config.session.grace_period_seconds,
        "Starting server"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // End any active session and stop the actor
    let _ = shutdown_tx.send(true);
    if let Err(e) = actor_task.await {
        warn!(error = %e, "Session actor task failed");
    }

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}
