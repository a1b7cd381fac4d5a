//! Common test utilities.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};

use chitai::hub::ConnectionId;
use chitai::server::{self, AppState};
use chitai::session::{ActorConfig, OUTBOUND_CAPACITY, SessionActor, SessionHandle};
use chitai::store::RecordStore;
use chitai_protocol::{Language, Role, ServerMessage, StatePayload};

pub const GRACE: Duration = Duration::from_secs(120);

/// A running session actor over a store.
pub struct TestSession {
    pub handle: SessionHandle,
    pub store: Arc<RecordStore>,
    pub shutdown_tx: watch::Sender<bool>,
    pub task: tokio::task::JoinHandle<()>,
}

impl TestSession {
    pub fn spawn(store: Arc<RecordStore>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (handle, task) = SessionActor::spawn(
            ActorConfig {
                resolver: store.clone(),
                gateway: store.clone(),
                grace_period: GRACE,
                default_language: Language::Ru,
            },
            shutdown_rx,
        );
        Self {
            handle,
            store,
            shutdown_tx,
            task,
        }
    }

    pub fn in_memory() -> Self {
        Self::spawn(Arc::new(RecordStore::in_memory()))
    }

    /// Stop the actor and wait for it to finish.
    pub async fn shutdown(self) {
        self.shutdown_tx.send(true).unwrap();
        self.task.await.unwrap();
    }
}

/// A party connected straight to the session actor.
pub struct Peer {
    pub id: ConnectionId,
    pub rx: mpsc::Receiver<ServerMessage>,
}

impl Peer {
    pub async fn join(handle: &SessionHandle, role: Role) -> Self {
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let id = handle.connect(role, tx).await.unwrap();
        Self { id, rx }
    }

    pub async fn next_state(&mut self) -> StatePayload {
        match self.rx.recv().await {
            Some(ServerMessage::State(state)) => state,
            other => panic!("expected state message, got {other:?}"),
        }
    }

    pub fn has_pending(&mut self) -> bool {
        !self.rx.is_empty()
    }
}

/// Create a test app backed by an in-memory session.
pub fn test_app(web_dir: Option<PathBuf>) -> (Router, TestSession) {
    let session = TestSession::in_memory();
    let state = AppState {
        session: session.handle.clone(),
        web_dir,
        max_connections: 16,
    };
    (server::build_app(state, 30), session)
}

/// Serve a test app on an ephemeral local port.
pub async fn spawn_server() -> (SocketAddr, TestSession) {
    let (app, session) = test_app(None);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, session)
}
