//! Record types and the in-memory projection they are folded into.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chitai_protocol::Language;

// ============================================================================
// Records
// ============================================================================

/// A deduplicated `(text, language)` unit of reading material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: String,
    pub text: String,
    pub language: Language,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub language: Option<Language>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Join row linking a session to an item it queued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionItemRecord {
    pub id: String,
    pub session_id: String,
    pub item_id: String,
    pub queued_at: DateTime<Utc>,
    pub displayed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub illustration_id: Option<String>,
}

// ============================================================================
// Store Events
// ============================================================================

/// One durable change. The journal is a sequence of these, one per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    ItemCreated {
        item: ItemRecord,
    },
    SessionStarted {
        session: SessionRecord,
    },
    SessionLanguageSet {
        session_id: String,
        language: Language,
    },
    SessionEnded {
        session_id: String,
        ended_at: DateTime<Utc>,
    },
    ItemQueued {
        session_item: SessionItemRecord,
    },
    ItemDisplayed {
        session_item_id: String,
        illustration_id: Option<String>,
        at: DateTime<Utc>,
    },
    ItemCompleted {
        session_item_id: String,
        at: DateTime<Utc>,
    },
    IllustrationLinked {
        item_id: String,
        illustration_id: String,
    },
    /// Changes that land together or not at all.
    Batch {
        events: Vec<StoreEvent>,
    },
}

impl StoreEvent {
    /// Combine events into one journal entry.
    pub fn all(mut events: Vec<StoreEvent>) -> StoreEvent {
        if events.len() == 1
            && let Some(event) = events.pop()
        {
            return event;
        }
        StoreEvent::Batch { events }
    }
}

// ============================================================================
// Projection
// ============================================================================

/// Current view of all records, rebuilt by folding store events.
#[derive(Debug, Default)]
pub struct Records {
    items: HashMap<String, ItemRecord>,
    item_keys: HashMap<(String, Language), String>,
    sessions: HashMap<String, SessionRecord>,
    session_items: HashMap<String, SessionItemRecord>,
    queue_order: HashMap<String, Vec<String>>,
    illustrations: HashMap<String, Vec<String>>,
}

impl Records {
    /// Fold one event into the projection.
    ///
    /// Events referring to unknown records are ignored. Completion and session
    /// end keep their first timestamp.
    pub fn apply(&mut self, event: StoreEvent) {
        match event {
            StoreEvent::Batch { events } => {
                for event in events {
                    self.apply(event);
                }
            }
            StoreEvent::ItemCreated { item } => {
                self.item_keys
                    .entry((item.text.clone(), item.language))
                    .or_insert_with(|| item.id.clone());
                self.items.insert(item.id.clone(), item);
            }
            StoreEvent::SessionStarted { session } => {
                self.sessions.insert(session.id.clone(), session);
            }
            StoreEvent::SessionLanguageSet {
                session_id,
                language,
            } => {
                if let Some(session) = self.sessions.get_mut(&session_id) {
                    session.language.get_or_insert(language);
                }
            }
            StoreEvent::SessionEnded {
                session_id,
                ended_at,
            } => {
                if let Some(session) = self.sessions.get_mut(&session_id) {
                    session.ended_at.get_or_insert(ended_at);
                }
            }
            StoreEvent::ItemQueued { session_item } => {
                if !self.session_items.contains_key(&session_item.id) {
                    self.queue_order
                        .entry(session_item.session_id.clone())
                        .or_default()
                        .push(session_item.id.clone());
                }
                self.session_items
                    .insert(session_item.id.clone(), session_item);
            }
            StoreEvent::ItemDisplayed {
                session_item_id,
                illustration_id,
                at,
            } => {
                if let Some(row) = self.session_items.get_mut(&session_item_id) {
                    row.displayed_at = Some(at);
                    row.illustration_id = illustration_id;
                }
            }
            StoreEvent::ItemCompleted {
                session_item_id,
                at,
            } => {
                if let Some(row) = self.session_items.get_mut(&session_item_id) {
                    row.completed_at.get_or_insert(at);
                }
            }
            StoreEvent::IllustrationLinked {
                item_id,
                illustration_id,
            } => {
                let links = self.illustrations.entry(item_id).or_default();
                if !links.contains(&illustration_id) {
                    links.push(illustration_id);
                }
            }
        }
    }

    pub fn item(&self, item_id: &str) -> Option<&ItemRecord> {
        self.items.get(item_id)
    }

    /// Find the item for an exact `(text, language)` pair.
    pub fn find_item(&self, text: &str, language: Language) -> Option<&ItemRecord> {
        self.item_keys
            .get(&(text.to_string(), language))
            .and_then(|id| self.items.get(id))
    }

    pub fn session(&self, session_id: &str) -> Option<&SessionRecord> {
        self.sessions.get(session_id)
    }

    pub fn session_item(&self, session_item_id: &str) -> Option<&SessionItemRecord> {
        self.session_items.get(session_item_id)
    }

    /// Session items of a session in the order they were queued.
    pub fn session_items_for(&self, session_id: &str) -> Vec<&SessionItemRecord> {
        self.queue_order
            .get(session_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.session_items.get(id))
            .collect()
    }

    pub fn illustrations_for(&self, item_id: &str) -> &[String] {
        self.illustrations
            .get(item_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}
