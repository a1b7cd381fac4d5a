//! Record store implementing the session core's collaborator traits.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use ulid::Ulid;

use chitai_protocol::Language;

use super::error::{StorageError, StorageResult};
use super::gateway::{ItemResolver, PersistenceGateway, Placement};
use super::journal::FileJournal;
use super::records::{ItemRecord, Records, SessionItemRecord, SessionRecord, StoreEvent};

/// Item, session and session-item records with optional file durability.
///
/// Every write validates against the projection, appends to the journal (if
/// any) and only then applies the event, all under one lock.
#[derive(Debug)]
pub struct RecordStore {
    records: Mutex<Records>,
    journal: Option<FileJournal>,
}

impl RecordStore {
    /// Create a store that keeps records in memory only.
    pub fn in_memory() -> Self {
        Self {
            records: Mutex::new(Records::default()),
            journal: None,
        }
    }

    /// Open a journal-backed store in `data_dir`, replaying existing records.
    pub async fn open(data_dir: impl AsRef<Path>) -> StorageResult<Self> {
        let (journal, records) = FileJournal::open(data_dir).await?;
        Ok(Self {
            records: Mutex::new(records),
            journal: Some(journal),
        })
    }

    pub fn is_durable(&self) -> bool {
        self.journal.is_some()
    }

    /// Associate an illustration with an item. Linking twice is a no-op.
    pub async fn link_illustration(&self, item_id: &str, illustration_id: &str) -> StorageResult<()> {
        let mut records = self.records.lock().await;
        if records.item(item_id).is_none() {
            return Err(StorageError::not_found("item", item_id));
        }
        if records
            .illustrations_for(item_id)
            .iter()
            .any(|id| id == illustration_id)
        {
            return Ok(());
        }
        self.commit(
            &mut records,
            StoreEvent::IllustrationLinked {
                item_id: item_id.to_string(),
                illustration_id: illustration_id.to_string(),
            },
        )
        .await
    }

    pub async fn session(&self, session_id: &str) -> Option<SessionRecord> {
        self.records.lock().await.session(session_id).cloned()
    }

    /// Session items of a session in queue order.
    pub async fn session_items(&self, session_id: &str) -> Vec<SessionItemRecord> {
        self.records
            .lock()
            .await
            .session_items_for(session_id)
            .into_iter()
            .cloned()
            .collect()
    }

    async fn commit(&self, records: &mut Records, event: StoreEvent) -> StorageResult<()> {
        if let Some(journal) = &self.journal {
            journal.append(&event).await?;
        }
        records.apply(event);
        Ok(())
    }
}

fn new_id() -> String {
    Ulid::new().to_string()
}

/// Look up a session item and check it belongs to `session_id`.
fn owned_session_item<'a>(
    records: &'a Records,
    session_id: &str,
    session_item_id: &str,
) -> StorageResult<&'a SessionItemRecord> {
    records
        .session_item(session_item_id)
        .filter(|row| row.session_id == session_id)
        .ok_or_else(|| StorageError::not_found("session item", session_item_id))
}

#[async_trait]
impl ItemResolver for RecordStore {
    async fn resolve(&self, text: &str, language: Language) -> StorageResult<ItemRecord> {
        let text = text.trim();
        let mut records = self.records.lock().await;
        if let Some(item) = records.find_item(text, language) {
            return Ok(item.clone());
        }

        let item = ItemRecord {
            id: new_id(),
            text: text.to_string(),
            language,
            created_at: Utc::now(),
        };
        self.commit(&mut records, StoreEvent::ItemCreated { item: item.clone() })
            .await?;
        Ok(item)
    }

    async fn load_item(&self, item_id: &str) -> StorageResult<Option<ItemRecord>> {
        Ok(self.records.lock().await.item(item_id).cloned())
    }
}

#[async_trait]
impl PersistenceGateway for RecordStore {
    // ========================================================================
    // Sessions
    // ========================================================================

    async fn record_session_start(&self, language: Option<Language>) -> StorageResult<String> {
        let mut records = self.records.lock().await;
        let session = SessionRecord {
            id: new_id(),
            language,
            started_at: Utc::now(),
            ended_at: None,
        };
        let id = session.id.clone();
        self.commit(&mut records, StoreEvent::SessionStarted { session })
            .await?;
        Ok(id)
    }

    async fn record_session_end(
        &self,
        session_id: &str,
        ended_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let mut records = self.records.lock().await;
        let session = records
            .session(session_id)
            .ok_or_else(|| StorageError::not_found("session", session_id))?;
        if session.ended_at.is_some() {
            return Ok(());
        }
        self.commit(
            &mut records,
            StoreEvent::SessionEnded {
                session_id: session_id.to_string(),
                ended_at,
            },
        )
        .await
    }

    // ========================================================================
    // Session items
    // ========================================================================

    async fn record_item_added(
        &self,
        session_id: &str,
        item_id: &str,
        language: Option<Language>,
        placement: Placement<'_>,
    ) -> StorageResult<String> {
        let mut records = self.records.lock().await;
        let session = records
            .session(session_id)
            .ok_or_else(|| StorageError::not_found("session", session_id))?;
        let bind = language.filter(|_| session.language.is_none());
        if records.item(item_id).is_none() {
            return Err(StorageError::not_found("item", item_id));
        }

        let now = Utc::now();
        let session_item = SessionItemRecord {
            id: new_id(),
            session_id: session_id.to_string(),
            item_id: item_id.to_string(),
            queued_at: now,
            displayed_at: None,
            completed_at: None,
            illustration_id: None,
        };
        let id = session_item.id.clone();

        let mut events = Vec::with_capacity(3);
        if let Some(language) = bind {
            events.push(StoreEvent::SessionLanguageSet {
                session_id: session_id.to_string(),
                language,
            });
        }
        events.push(StoreEvent::ItemQueued { session_item });
        if let Placement::Displayed { illustration_id } = placement {
            events.push(StoreEvent::ItemDisplayed {
                session_item_id: id.clone(),
                illustration_id: illustration_id.map(str::to_string),
                at: now,
            });
        }

        self.commit(&mut records, StoreEvent::all(events)).await?;
        Ok(id)
    }

    async fn record_item_advanced(
        &self,
        session_id: &str,
        completed: Option<&str>,
        displayed: &str,
        illustration_id: Option<&str>,
    ) -> StorageResult<()> {
        let mut records = self.records.lock().await;
        let now = Utc::now();
        let mut events = Vec::with_capacity(2);

        if let Some(completed) = completed {
            let row = owned_session_item(&records, session_id, completed)?;
            if row.completed_at.is_none() {
                events.push(StoreEvent::ItemCompleted {
                    session_item_id: completed.to_string(),
                    at: now,
                });
            }
        }
        owned_session_item(&records, session_id, displayed)?;
        events.push(StoreEvent::ItemDisplayed {
            session_item_id: displayed.to_string(),
            illustration_id: illustration_id.map(str::to_string),
            at: now,
        });

        self.commit(&mut records, StoreEvent::all(events)).await
    }

    async fn record_completion(
        &self,
        session_id: &str,
        session_item_id: &str,
    ) -> StorageResult<()> {
        let mut records = self.records.lock().await;
        let row = owned_session_item(&records, session_id, session_item_id)?;
        if row.completed_at.is_some() {
            return Ok(());
        }
        self.commit(
            &mut records,
            StoreEvent::ItemCompleted {
                session_item_id: session_item_id.to_string(),
                at: Utc::now(),
            },
        )
        .await
    }

    // ========================================================================
    // Illustrations
    // ========================================================================

    async fn linked_illustrations(&self, item_id: &str) -> StorageResult<Vec<String>> {
        Ok(self.records.lock().await.illustrations_for(item_id).to_vec())
    }
}
