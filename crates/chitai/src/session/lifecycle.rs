//! Item lifecycle: `queued → displayed → completed`.
//!
//! Each operation validates against the current [`SessionState`], performs
//! its storage write, and only then commits the change in memory. A
//! transition touching several rows goes out as one gateway call. An
//! operation that is illegal in the current state is reported as
//! [`Transition::Ignored`] without touching storage; a failed write leaves the
//! state exactly as it was.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use thiserror::Error;
use tracing::debug;

use chitai_protocol::{ItemSource, Language};

use crate::language::words;
use crate::store::{ItemRecord, ItemResolver, PersistenceGateway, Placement, StorageError};

use super::illustration::choose_illustration;
use super::state::{CurrentItem, QueueEntry, SessionState, step_cursor};

// ============================================================================
// Outcomes
// ============================================================================

/// Result of an operation that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Observable state changed and must be broadcast.
    Changed,
    /// The operation was not legal in the current state; nothing happened.
    Ignored(StateError),
}

/// Why an operation was a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("a session is already active")]
    AlreadyActive,
    #[error("no session is active")]
    NotActive,
    #[error("no item is on screen")]
    NoCurrentItem,
    #[error("the current item is already completed")]
    ItemCompleted,
    #[error("the queue is empty")]
    QueueEmpty,
    #[error("the text contains no words")]
    NoWords,
    #[error("no item with that id")]
    UnknownItem,
    #[error("item language does not match the session language")]
    LanguageMismatch,
    #[error("the cursor would not move")]
    NoMovement,
}

/// Failure of a storage write.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("storage write failed: {0}")]
    Storage(#[from] StorageError),
}

impl LifecycleError {
    /// Short code sent to the client in an error message.
    pub fn code(&self) -> &'static str {
        match self {
            LifecycleError::Storage(_) => "storage_failed",
        }
    }
}

type LifecycleResult = Result<Transition, LifecycleError>;

// ============================================================================
// Lifecycle Manager
// ============================================================================

pub struct LifecycleManager {
    resolver: Arc<dyn ItemResolver>,
    gateway: Arc<dyn PersistenceGateway>,
    default_language: Language,
    rng: StdRng,
}

impl LifecycleManager {
    pub fn new(
        resolver: Arc<dyn ItemResolver>,
        gateway: Arc<dyn PersistenceGateway>,
        default_language: Language,
    ) -> Self {
        Self::with_rng(resolver, gateway, default_language, StdRng::from_os_rng())
    }

    /// Create a manager with an explicit RNG for illustration choice.
    pub fn with_rng(
        resolver: Arc<dyn ItemResolver>,
        gateway: Arc<dyn PersistenceGateway>,
        default_language: Language,
        rng: StdRng,
    ) -> Self {
        Self {
            resolver,
            gateway,
            default_language,
            rng,
        }
    }

    // ------------------------------------------------------------------------
    // Session start / end
    // ------------------------------------------------------------------------

    pub async fn start_session(
        &mut self,
        state: &mut SessionState,
        language: Option<Language>,
    ) -> LifecycleResult {
        if state.is_active() {
            return Ok(Transition::Ignored(StateError::AlreadyActive));
        }

        let session_id = self.gateway.record_session_start(language).await?;
        debug!(%session_id, ?language, "Session started");
        state.activate(session_id, language);
        Ok(Transition::Changed)
    }

    /// End the active session. Ending an inactive session is a no-op.
    pub async fn end_session(
        &mut self,
        state: &mut SessionState,
        ended_at: DateTime<Utc>,
    ) -> LifecycleResult {
        let Some(session_id) = state.session_id() else {
            return Ok(Transition::Ignored(StateError::NotActive));
        };

        self.gateway.record_session_end(session_id, ended_at).await?;
        debug!(%session_id, %ended_at, "Session ended");
        state.clear();
        Ok(Transition::Changed)
    }

    // ------------------------------------------------------------------------
    // Items
    // ------------------------------------------------------------------------

    /// Queue an item, displaying it at once if nothing is on screen.
    ///
    /// The session language is bound by the first item when the session
    /// started without one: the item's explicit language, else the default.
    pub async fn add_item(
        &mut self,
        state: &mut SessionState,
        source: ItemSource,
        language: Option<Language>,
    ) -> LifecycleResult {
        let Some(session_id) = state.session_id().map(str::to_string) else {
            return Ok(Transition::Ignored(StateError::NotActive));
        };

        let required = match (state.language(), language) {
            (Some(session), Some(requested)) if session != requested => {
                return Ok(Transition::Ignored(StateError::LanguageMismatch));
            }
            (Some(session), _) => Some(session),
            (None, requested) => requested,
        };

        let item = match self.lookup(source, required).await? {
            Ok(item) => item,
            Err(reason) => return Ok(Transition::Ignored(reason)),
        };

        let bind = state.language().is_none().then_some(item.language);
        let show = state.current().is_none();
        let illustration_id = if show {
            self.pick_illustration(&item.id).await?
        } else {
            None
        };
        let placement = if show {
            Placement::Displayed {
                illustration_id: illustration_id.as_deref(),
            }
        } else {
            Placement::Queued
        };

        let session_item_id = self
            .gateway
            .record_item_added(&session_id, &item.id, bind, placement)
            .await?;
        let entry = QueueEntry {
            session_item_id,
            item_id: item.id,
            text: item.text,
        };

        state.bind_language(item.language);
        if show {
            state.set_current(CurrentItem::displayed(entry, illustration_id));
        } else {
            state.enqueue(entry);
        }
        Ok(Transition::Changed)
    }

    /// Move the word cursor; stepping past the last word completes the item.
    pub async fn advance_word(&mut self, state: &mut SessionState, delta: i64) -> LifecycleResult {
        let Some(session_id) = state.session_id() else {
            return Ok(Transition::Ignored(StateError::NotActive));
        };
        let Some(current) = state.current() else {
            return Ok(Transition::Ignored(StateError::NoCurrentItem));
        };
        let Some(cursor) = current.cursor else {
            return Ok(Transition::Ignored(StateError::ItemCompleted));
        };

        let next = step_cursor(cursor, delta, current.words.len());
        if next == Some(cursor) {
            return Ok(Transition::Ignored(StateError::NoMovement));
        }
        if next.is_none() {
            self.gateway
                .record_completion(session_id, &current.entry.session_item_id)
                .await?;
        }
        state.set_cursor(next);
        Ok(Transition::Changed)
    }

    /// Complete whatever is on screen and display the queue head.
    pub async fn next_item(&mut self, state: &mut SessionState) -> LifecycleResult {
        let Some(session_id) = state.session_id().map(str::to_string) else {
            return Ok(Transition::Ignored(StateError::NotActive));
        };
        let Some(head) = state.queue().front().cloned() else {
            return Ok(Transition::Ignored(StateError::QueueEmpty));
        };

        // A completed item already has its completion record.
        let completed = state
            .current()
            .filter(|current| !current.is_completed())
            .map(|current| current.entry.session_item_id.clone());
        let illustration_id = self.pick_illustration(&head.item_id).await?;

        self.gateway
            .record_item_advanced(
                &session_id,
                completed.as_deref(),
                &head.session_item_id,
                illustration_id.as_deref(),
            )
            .await?;
        state.pop_queue();
        state.set_current(CurrentItem::displayed(head, illustration_id));
        Ok(Transition::Changed)
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    /// Find the item an `add_item` refers to, checking it is displayable.
    async fn lookup(
        &self,
        source: ItemSource,
        required: Option<Language>,
    ) -> Result<Result<ItemRecord, StateError>, LifecycleError> {
        let item = match source {
            ItemSource::Text(text) => {
                if words(&text).is_empty() {
                    return Ok(Err(StateError::NoWords));
                }
                let language = required.unwrap_or(self.default_language);
                self.resolver.resolve(&text, language).await?
            }
            ItemSource::ItemId(item_id) => {
                let Some(item) = self.resolver.load_item(&item_id).await? else {
                    return Ok(Err(StateError::UnknownItem));
                };
                if required.is_some_and(|language| language != item.language) {
                    return Ok(Err(StateError::LanguageMismatch));
                }
                if words(&item.text).is_empty() {
                    return Ok(Err(StateError::NoWords));
                }
                item
            }
        };
        Ok(Ok(item))
    }

    /// Choose one of the illustrations linked to an item.
    async fn pick_illustration(&mut self, item_id: &str) -> Result<Option<String>, LifecycleError> {
        let candidates = self.gateway.linked_illustrations(item_id).await?;
        Ok(choose_illustration(&candidates, &mut self.rng))
    }
}
