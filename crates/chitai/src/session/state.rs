//! In-memory model of the live session.

use std::collections::VecDeque;

use chitai_protocol::{Language, QueueItem, StatePayload};

use crate::language::{syllabify, words};

// ============================================================================
// Queue / Current Item
// ============================================================================

/// A content item staged in the session queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub session_item_id: String,
    pub item_id: String,
    pub text: String,
}

/// The item on screen, with its word cursor.
///
/// `cursor == None` is the completed sub-state: words stay visible but the
/// cursor can never return for this item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentItem {
    pub entry: QueueEntry,
    pub words: Vec<String>,
    pub cursor: Option<usize>,
    pub illustration_id: Option<String>,
}

impl CurrentItem {
    /// Put an entry on screen with the cursor on its first word.
    pub fn displayed(entry: QueueEntry, illustration_id: Option<String>) -> Self {
        let words = words(&entry.text);
        Self {
            entry,
            words,
            cursor: Some(0),
            illustration_id,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.cursor.is_none()
    }
}

/// Where a cursor lands after moving by `delta` over `len` words.
///
/// Moving below the first word clamps to 0; moving past the last word yields
/// `None` (completed).
pub fn step_cursor(cursor: usize, delta: i64, len: usize) -> Option<usize> {
    let target = (cursor as i64).saturating_add(delta);
    if target >= len as i64 {
        None
    } else {
        Some(target.max(0) as usize)
    }
}

// ============================================================================
// Session State
// ============================================================================

/// Authoritative state of the one live session, or of no session.
///
/// A session is active iff `session_id` is set. Only the lifecycle manager
/// mutates it, and only after the matching storage write succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    session_id: Option<String>,
    language: Option<Language>,
    queue: VecDeque<QueueEntry>,
    current: Option<CurrentItem>,
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        self.session_id.is_some()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn language(&self) -> Option<Language> {
        self.language
    }

    pub fn queue(&self) -> &VecDeque<QueueEntry> {
        &self.queue
    }

    pub fn current(&self) -> Option<&CurrentItem> {
        self.current.as_ref()
    }

    /// Build the broadcast view. Syllables are derived here on every call.
    pub fn snapshot(&self) -> StatePayload {
        let language = self.language;
        let (words, current_word_index, illustration_id) = match &self.current {
            Some(current) => (
                current.words.clone(),
                current.cursor,
                current.illustration_id.clone(),
            ),
            None => (Vec::new(), None, None),
        };
        let syllables = words
            .iter()
            .map(|word| match language {
                Some(language) => syllabify(word, language),
                None => vec![word.clone()],
            })
            .collect();

        StatePayload {
            session_id: self.session_id.clone(),
            language,
            words,
            syllables,
            current_word_index,
            illustration_id,
            queue: self
                .queue
                .iter()
                .map(|entry| QueueItem {
                    session_item_id: entry.session_item_id.clone(),
                    item_id: entry.item_id.clone(),
                    text: entry.text.clone(),
                })
                .collect(),
        }
    }

    // ------------------------------------------------------------------------
    // Mutators (lifecycle only)
    // ------------------------------------------------------------------------

    pub(super) fn activate(&mut self, session_id: String, language: Option<Language>) {
        *self = Self {
            session_id: Some(session_id),
            language,
            ..Self::default()
        };
    }

    pub(super) fn clear(&mut self) {
        *self = Self::default();
    }

    /// Bind the session language. Has no effect once a language is set.
    pub(super) fn bind_language(&mut self, language: Language) {
        self.language.get_or_insert(language);
    }

    pub(super) fn enqueue(&mut self, entry: QueueEntry) {
        self.queue.push_back(entry);
    }

    pub(super) fn pop_queue(&mut self) -> Option<QueueEntry> {
        self.queue.pop_front()
    }

    pub(super) fn set_current(&mut self, current: CurrentItem) {
        self.current = Some(current);
    }

    pub(super) fn set_cursor(&mut self, cursor: Option<usize>) {
        if let Some(current) = self.current.as_mut() {
            current.cursor = cursor;
        }
    }
}
