//! Test doubles for the session core.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use chitai_protocol::Language;

use crate::store::{PersistenceGateway, Placement, RecordStore, StorageError, StorageResult};

/// Gateway over a [`RecordStore`] that counts writes and fails chosen operations.
///
/// Operation names: `start`, `language`, `end`, `queued`, `display`, `completion`.
/// A combined write fails if any operation it carries is failing.
pub struct FlakyGateway {
    inner: Arc<RecordStore>,
    failing: Mutex<Vec<&'static str>>,
    completions: AtomicUsize,
    ends: AtomicUsize,
}

impl FlakyGateway {
    pub fn new(inner: Arc<RecordStore>) -> Self {
        Self {
            inner,
            failing: Mutex::new(Vec::new()),
            completions: AtomicUsize::new(0),
            ends: AtomicUsize::new(0),
        }
    }

    pub fn fail(&self, op: &'static str) {
        self.failing.lock().unwrap().push(op);
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    /// Successful writes that completed an item.
    pub fn completions(&self) -> usize {
        self.completions.load(Ordering::SeqCst)
    }

    /// Successful `record_session_end` calls.
    pub fn ends(&self) -> usize {
        self.ends.load(Ordering::SeqCst)
    }

    fn check(&self, op: &'static str) -> StorageResult<()> {
        if self.failing.lock().unwrap().contains(&op) {
            return Err(StorageError::file_io(
                "simulated",
                std::io::Error::other("simulated failure"),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl PersistenceGateway for FlakyGateway {
    async fn record_session_start(&self, language: Option<Language>) -> StorageResult<String> {
        self.check("start")?;
        self.inner.record_session_start(language).await
    }

    async fn record_session_end(
        &self,
        session_id: &str,
        ended_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        self.check("end")?;
        self.inner.record_session_end(session_id, ended_at).await?;
        self.ends.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn record_item_added(
        &self,
        session_id: &str,
        item_id: &str,
        language: Option<Language>,
        placement: Placement<'_>,
    ) -> StorageResult<String> {
        if language.is_some() {
            self.check("language")?;
        }
        self.check("queued")?;
        if matches!(placement, Placement::Displayed { .. }) {
            self.check("display")?;
        }
        self.inner
            .record_item_added(session_id, item_id, language, placement)
            .await
    }

    async fn record_item_advanced(
        &self,
        session_id: &str,
        completed: Option<&str>,
        displayed: &str,
        illustration_id: Option<&str>,
    ) -> StorageResult<()> {
        if completed.is_some() {
            self.check("completion")?;
        }
        self.check("display")?;
        self.inner
            .record_item_advanced(session_id, completed, displayed, illustration_id)
            .await?;
        if completed.is_some() {
            self.completions.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn record_completion(
        &self,
        session_id: &str,
        session_item_id: &str,
    ) -> StorageResult<()> {
        self.check("completion")?;
        self.inner
            .record_completion(session_id, session_item_id)
            .await?;
        self.completions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn linked_illustrations(&self, item_id: &str) -> StorageResult<Vec<String>> {
        self.inner.linked_illustrations(item_id).await
    }
}
