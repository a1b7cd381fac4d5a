//! The session actor: single owner of the live session.
//!
//! One task owns the [`SessionState`], the [`LifecycleManager`], the
//! [`GraceTimer`] and the connection registry. Commands from every connection
//! arrive on one channel and are handled strictly in order, so no locks guard
//! the state. Timer expiry is another branch of the same select loop.

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use chitai_protocol::{ClientMessage, ServerMessage};

use crate::hub::{ConnectionId, Connections};

use super::actor_types::{ActorConfig, CHANNEL_CAPACITY, SessionCommand};
use super::grace_timer::GraceTimer;
use super::handle::SessionHandle;
use super::lifecycle::{LifecycleError, LifecycleManager, Transition};
use super::state::SessionState;

// ============================================================================
// Session Actor
// ============================================================================

pub struct SessionActor {
    state: SessionState,
    lifecycle: LifecycleManager,
    timer: GraceTimer,
    connections: Connections,

    // Communication
    command_rx: mpsc::Receiver<SessionCommand>,
    shutdown_rx: watch::Receiver<bool>,
}

impl SessionActor {
    /// Spawn the session actor.
    ///
    /// Returns a handle for connections and the JoinHandle of the actor task.
    /// When `shutdown_rx` turns true the actor ends any active session and
    /// stops.
    pub fn spawn(
        config: ActorConfig,
        shutdown_rx: watch::Receiver<bool>,
    ) -> (SessionHandle, tokio::task::JoinHandle<()>) {
        let lifecycle =
            LifecycleManager::new(config.resolver, config.gateway, config.default_language);
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        let actor = Self {
            state: SessionState::default(),
            lifecycle,
            timer: GraceTimer::new(config.grace_period),
            connections: Connections::default(),
            command_rx: rx,
            shutdown_rx,
        };

        let handle = tokio::spawn(actor.run());
        (SessionHandle::new(tx), handle)
    }

    async fn run(mut self) {
        debug!(
            grace_period_secs = self.timer.period().as_secs(),
            "Session actor started"
        );

        loop {
            tokio::select! {
                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        debug!("Session actor received shutdown signal");
                        self.drain_commands().await;
                        self.shutdown().await;
                        break;
                    }
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(command) => self.handle_command(command).await,
                        None => {
                            debug!("All handles dropped, shutting down");
                            self.shutdown().await;
                            break;
                        }
                    }
                }

                _ = self.timer.expired() => {
                    self.on_grace_expired().await;
                }
            }
        }

        debug!("Session actor stopped");
    }

    /// Drain and process all remaining commands in the queue.
    async fn drain_commands(&mut self) {
        while let Ok(cmd) = self.command_rx.try_recv() {
            self.handle_command(cmd).await;
        }
    }

    async fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Connect {
                role,
                outbound,
                reply,
            } => {
                let connection_id = self.connections.register(role, outbound);
                let snapshot = ServerMessage::State(self.state.snapshot());
                self.connections.send_to(connection_id, snapshot);
                info!(
                    connection_id,
                    %role,
                    connections = self.connections.len(),
                    "Connection joined"
                );
                let _ = reply.send(connection_id);
            }
            SessionCommand::Disconnect { connection_id } => {
                if self.connections.remove(connection_id) {
                    info!(
                        connection_id,
                        connections = self.connections.len(),
                        "Connection left"
                    );
                }
            }
            SessionCommand::Inbound {
                connection_id,
                message,
            } => {
                self.handle_inbound(connection_id, message).await;
            }
            SessionCommand::GetState { reply } => {
                let _ = reply.send(self.state.snapshot());
            }
            SessionCommand::ConnectionCount { reply } => {
                let _ = reply.send(self.connections.len());
            }
        }
    }

    // ========================================================================
    // Protocol
    // ========================================================================

    async fn handle_inbound(&mut self, connection_id: ConnectionId, message: ClientMessage) {
        let kind = message.kind();
        let result = match message {
            ClientMessage::StartSession { language } => {
                self.lifecycle
                    .start_session(&mut self.state, language)
                    .await
            }
            ClientMessage::EndSession => {
                self.lifecycle
                    .end_session(&mut self.state, Utc::now())
                    .await
            }
            ClientMessage::AddItem { source, language } => {
                self.lifecycle
                    .add_item(&mut self.state, source, language)
                    .await
            }
            ClientMessage::AdvanceWord { delta } => {
                self.lifecycle.advance_word(&mut self.state, delta).await
            }
            ClientMessage::NextItem => self.lifecycle.next_item(&mut self.state).await,
        };

        // Any message counts as activity while a session is active.
        if self.state.is_active() {
            self.timer.refresh();
        } else {
            self.timer.cancel();
        }

        match result {
            Ok(Transition::Changed) => {
                debug!(connection_id, kind, "State changed");
                self.broadcast();
            }
            Ok(Transition::Ignored(reason)) => {
                debug!(connection_id, kind, %reason, "Message ignored");
            }
            Err(e) => self.report_failure(connection_id, kind, e),
        }
    }

    fn report_failure(&mut self, connection_id: ConnectionId, kind: &str, error: LifecycleError) {
        warn!(connection_id, kind, error = %error, "Operation failed, state unchanged");
        let message = ServerMessage::error(error.code(), error.to_string());
        self.connections.send_to(connection_id, message);
    }

    fn broadcast(&mut self) {
        let snapshot = ServerMessage::State(self.state.snapshot());
        let delivered = self.connections.broadcast(&snapshot);
        debug!(delivered, "Broadcast state");
    }

    // ========================================================================
    // Session End
    // ========================================================================

    /// End the session after the grace period passed without activity.
    ///
    /// The recorded end time is the last activity, not the expiry.
    async fn on_grace_expired(&mut self) {
        let ended_at = self.timer.last_refresh().unwrap_or_else(Utc::now);
        let session_id = self.state.session_id().map(str::to_string);

        match self.lifecycle.end_session(&mut self.state, ended_at).await {
            Ok(Transition::Changed) => {
                info!(
                    session_id = session_id.as_deref().unwrap_or_default(),
                    idle_secs = self.timer.period().as_secs(),
                    "Session ended after grace period"
                );
                self.timer.cancel();
                self.broadcast();
            }
            Ok(Transition::Ignored(_)) => self.timer.cancel(),
            Err(e) => {
                warn!(error = %e, "Failed to end idle session, retrying after grace period");
                self.timer.rearm();
            }
        }
    }

    async fn shutdown(&mut self) {
        self.timer.cancel();
        let Some(session_id) = self.state.session_id().map(str::to_string) else {
            return;
        };

        match self
            .lifecycle
            .end_session(&mut self.state, Utc::now())
            .await
        {
            Ok(_) => {
                info!(%session_id, "Active session ended on shutdown");
                self.broadcast();
            }
            Err(e) => warn!(%session_id, error = %e, "Failed to end session on shutdown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use chitai_protocol::{ItemSource, Language, Role, StatePayload};
    use tokio::time::sleep;

    use crate::session::actor_types::OUTBOUND_CAPACITY;
    use crate::session::testing::FlakyGateway;
    use crate::store::RecordStore;

    const GRACE: Duration = Duration::from_secs(60);

    struct Harness {
        store: Arc<RecordStore>,
        gateway: Arc<FlakyGateway>,
        handle: SessionHandle,
        shutdown_tx: watch::Sender<bool>,
        task: tokio::task::JoinHandle<()>,
    }

    fn setup() -> Harness {
        let store = Arc::new(RecordStore::in_memory());
        let gateway = Arc::new(FlakyGateway::new(store.clone()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let config = ActorConfig {
            resolver: store.clone(),
            gateway: gateway.clone(),
            grace_period: GRACE,
            default_language: Language::En,
        };
        let (handle, task) = SessionActor::spawn(config, shutdown_rx);
        Harness {
            store,
            gateway,
            handle,
            shutdown_tx,
            task,
        }
    }

    async fn join(
        handle: &SessionHandle,
        role: Role,
    ) -> (ConnectionId, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let id = handle.connect(role, tx).await.unwrap();
        (id, rx)
    }

    async fn next_state(rx: &mut mpsc::Receiver<ServerMessage>) -> StatePayload {
        match rx.recv().await {
            Some(ServerMessage::State(state)) => state,
            other => panic!("expected state message, got {other:?}"),
        }
    }

    fn add(text: &str) -> ClientMessage {
        ClientMessage::AddItem {
            source: ItemSource::Text(text.to_string()),
            language: None,
        }
    }

    #[tokio::test]
    async fn connect_receives_current_state() {
        let h = setup();
        let (_, mut rx) = join(&h.handle, Role::Display).await;
        assert_eq!(next_state(&mut rx).await, StatePayload::default());
        assert_eq!(h.handle.connection_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn changes_are_broadcast_to_everyone_including_sender() {
        let h = setup();
        let (controller, mut rx_controller) = join(&h.handle, Role::Controller).await;
        let (_, mut rx_display) = join(&h.handle, Role::Display).await;
        next_state(&mut rx_controller).await;
        next_state(&mut rx_display).await;

        h.handle
            .dispatch(controller, ClientMessage::StartSession { language: None })
            .await
            .unwrap();
        h.handle.dispatch(controller, add("cat")).await.unwrap();

        for rx in [&mut rx_controller, &mut rx_display] {
            let started = next_state(rx).await;
            assert!(started.session_id.is_some());
            assert!(started.words.is_empty());

            let added = next_state(rx).await;
            assert_eq!(added.words, vec!["cat"]);
            assert_eq!(added.current_word_index, Some(0));
        }
    }

    #[tokio::test]
    async fn ignored_messages_are_not_broadcast() {
        let h = setup();
        let (id, mut rx) = join(&h.handle, Role::Controller).await;
        next_state(&mut rx).await;

        h.handle.dispatch(id, ClientMessage::EndSession).await.unwrap();
        h.handle.dispatch(id, ClientMessage::NextItem).await.unwrap();
        h.handle
            .dispatch(id, ClientMessage::StartSession { language: None })
            .await
            .unwrap();
        h.handle.dispatch(id, ClientMessage::NextItem).await.unwrap();
        h.handle
            .dispatch(id, ClientMessage::AdvanceWord { delta: 1 })
            .await
            .unwrap();
        let state = h.handle.state().await.unwrap();

        // Only the start produced a broadcast.
        assert_eq!(next_state(&mut rx).await, state);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn reconnect_sees_last_broadcast() {
        let h = setup();
        let (id, mut rx) = join(&h.handle, Role::Controller).await;
        next_state(&mut rx).await;
        h.handle
            .dispatch(id, ClientMessage::StartSession { language: None })
            .await
            .unwrap();
        h.handle.dispatch(id, add("one two")).await.unwrap();
        h.handle.dispatch(id, add("three")).await.unwrap();
        h.handle
            .dispatch(id, ClientMessage::AdvanceWord { delta: 1 })
            .await
            .unwrap();
        let mut last = None;
        for _ in 0..4 {
            last = Some(next_state(&mut rx).await);
        }

        let (_, mut rx_late) = join(&h.handle, Role::Observer).await;
        assert_eq!(Some(next_state(&mut rx_late).await), last);
    }

    #[tokio::test]
    async fn storage_failure_is_reported_to_sender_only() {
        let h = setup();
        let (controller, mut rx_controller) = join(&h.handle, Role::Controller).await;
        let (_, mut rx_display) = join(&h.handle, Role::Display).await;
        next_state(&mut rx_controller).await;
        next_state(&mut rx_display).await;

        h.gateway.fail("start");
        h.handle
            .dispatch(controller, ClientMessage::StartSession { language: None })
            .await
            .unwrap();
        let state = h.handle.state().await.unwrap();
        assert!(state.session_id.is_none());

        match rx_controller.recv().await {
            Some(ServerMessage::Error(payload)) => assert_eq!(payload.code, "storage_failed"),
            other => panic!("expected error message, got {other:?}"),
        }
        assert!(rx_display.try_recv().is_err());
    }

    #[tokio::test]
    async fn disconnect_leaves_session_running() {
        let h = setup();
        let (id, mut rx) = join(&h.handle, Role::Controller).await;
        next_state(&mut rx).await;
        h.handle
            .dispatch(id, ClientMessage::StartSession { language: None })
            .await
            .unwrap();
        h.handle.disconnect(id).await.unwrap();

        assert_eq!(h.handle.connection_count().await.unwrap(), 0);
        assert!(h.handle.state().await.unwrap().session_id.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_session_ends_after_grace_period() {
        let h = setup();
        let (id, mut rx) = join(&h.handle, Role::Controller).await;
        next_state(&mut rx).await;
        h.handle
            .dispatch(id, ClientMessage::StartSession { language: None })
            .await
            .unwrap();
        let started = next_state(&mut rx).await;
        let session_id = started.session_id.unwrap();

        sleep(GRACE - Duration::from_secs(1)).await;
        assert!(h.handle.state().await.unwrap().session_id.is_some());

        sleep(Duration::from_secs(2)).await;
        assert_eq!(next_state(&mut rx).await, StatePayload::default());
        assert_eq!(h.gateway.ends(), 1);
        assert!(h.store.session(&session_id).await.unwrap().ended_at.is_some());

        // Cancelled, not re-armed.
        sleep(GRACE * 3).await;
        assert_eq!(h.gateway.ends(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn any_message_resets_the_grace_period() {
        let h = setup();
        let (id, mut rx) = join(&h.handle, Role::Controller).await;
        next_state(&mut rx).await;
        h.handle
            .dispatch(id, ClientMessage::StartSession { language: None })
            .await
            .unwrap();

        for _ in 0..3 {
            sleep(GRACE - Duration::from_secs(5)).await;
            // Ignored messages count as activity too.
            h.handle.dispatch(id, ClientMessage::NextItem).await.unwrap();
        }
        assert!(h.handle.state().await.unwrap().session_id.is_some());
        assert_eq!(h.gateway.ends(), 0);

        sleep(GRACE + Duration::from_secs(1)).await;
        assert!(h.handle.state().await.unwrap().session_id.is_none());
        assert_eq!(h.gateway.ends(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_idle_end_is_retried() {
        let h = setup();
        let (id, mut rx) = join(&h.handle, Role::Controller).await;
        next_state(&mut rx).await;
        h.handle
            .dispatch(id, ClientMessage::StartSession { language: None })
            .await
            .unwrap();

        h.gateway.fail("end");
        sleep(GRACE + Duration::from_secs(1)).await;
        assert!(h.handle.state().await.unwrap().session_id.is_some());

        h.gateway.heal();
        sleep(GRACE).await;
        assert!(h.handle.state().await.unwrap().session_id.is_none());
        assert_eq!(h.gateway.ends(), 1);
    }

    #[tokio::test]
    async fn explicit_end_cancels_timer() {
        let h = setup();
        let (id, mut rx) = join(&h.handle, Role::Controller).await;
        next_state(&mut rx).await;
        h.handle
            .dispatch(id, ClientMessage::StartSession { language: None })
            .await
            .unwrap();
        h.handle.dispatch(id, ClientMessage::EndSession).await.unwrap();

        assert!(next_state(&mut rx).await.session_id.is_some());
        assert_eq!(next_state(&mut rx).await, StatePayload::default());
        assert_eq!(h.gateway.ends(), 1);
    }

    #[tokio::test]
    async fn shutdown_ends_active_session() {
        let h = setup();
        let (id, mut rx) = join(&h.handle, Role::Controller).await;
        next_state(&mut rx).await;
        h.handle
            .dispatch(id, ClientMessage::StartSession { language: None })
            .await
            .unwrap();
        let session_id = next_state(&mut rx).await.session_id.unwrap();

        h.shutdown_tx.send(true).unwrap();
        h.task.await.unwrap();

        assert_eq!(h.gateway.ends(), 1);
        assert!(h.store.session(&session_id).await.unwrap().ended_at.is_some());
        assert_eq!(next_state(&mut rx).await, StatePayload::default());
        assert!(matches!(
            h.handle.state().await,
            Err(crate::session::ActorError::ActorShutdown)
        ));
    }
}
