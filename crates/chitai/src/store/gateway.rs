//! Collaborator traits consumed by the session core.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use chitai_protocol::Language;

use super::error::StorageResult;
use super::records::ItemRecord;

/// Resolves reading material to durable content items.
#[async_trait]
pub trait ItemResolver: Send + Sync {
    /// Find or create the item for `(text, language)`.
    ///
    /// Repeated calls with the same pair return the same item.
    async fn resolve(&self, text: &str, language: Language) -> StorageResult<ItemRecord>;

    /// Look up an existing item by ID.
    ///
    /// Returns `Ok(None)` if no such item exists.
    async fn load_item(&self, item_id: &str) -> StorageResult<Option<ItemRecord>>;
}

/// Where a newly added item goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement<'a> {
    /// Behind whatever is on screen.
    Queued,
    /// Straight on screen, with the chosen illustration.
    Displayed { illustration_id: Option<&'a str> },
}

/// Write-through interface for the session timeline.
///
/// Every method must be durable before it returns: the session core only
/// advertises a transition to clients after the matching call succeeded. A
/// transition touching several rows is a single call, so a failure leaves
/// none of them written.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    // ========================================================================
    // Sessions
    // ========================================================================

    /// Create a session record and return its ID.
    async fn record_session_start(&self, language: Option<Language>) -> StorageResult<String>;

    /// Record the end of a session. Ending an ended session is a no-op.
    async fn record_session_end(
        &self,
        session_id: &str,
        ended_at: DateTime<Utc>,
    ) -> StorageResult<()>;

    // ========================================================================
    // Session items
    // ========================================================================

    /// Record an item added to a session as one write.
    ///
    /// `language` binds the session language if the session has none yet.
    /// Returns the new session item ID.
    async fn record_item_added(
        &self,
        session_id: &str,
        item_id: &str,
        language: Option<Language>,
        placement: Placement<'_>,
    ) -> StorageResult<String>;

    /// Complete `completed` (if given) and display `displayed` as one write.
    async fn record_item_advanced(
        &self,
        session_id: &str,
        completed: Option<&str>,
        displayed: &str,
        illustration_id: Option<&str>,
    ) -> StorageResult<()>;

    /// Record that a session item was completed.
    ///
    /// Completing an already completed item keeps the first timestamp.
    async fn record_completion(&self, session_id: &str, session_item_id: &str)
    -> StorageResult<()>;

    // ========================================================================
    // Illustrations
    // ========================================================================

    /// Illustration IDs linked to an item, in link order.
    async fn linked_illustrations(&self, item_id: &str) -> StorageResult<Vec<String>>;
}
