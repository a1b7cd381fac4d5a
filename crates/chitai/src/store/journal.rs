//! Append-only JSONL journal of store events.
//!
//! Directory structure:
//! ```text
//! {data_dir}/
//!   records.jsonl    # One StoreEvent per line
//! ```

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::warn;

use super::error::{StorageError, StorageResult};
use super::records::{Records, StoreEvent};

/// File name of the journal inside the data directory.
pub const JOURNAL_FILE: &str = "records.jsonl";

/// Durable event log backing a [`RecordStore`](super::RecordStore).
#[derive(Debug, Clone)]
pub struct FileJournal {
    path: PathBuf,
}

impl FileJournal {
    /// Open the journal in `data_dir` and replay it into a fresh projection.
    ///
    /// The directory is created if needed. A malformed final line is treated
    /// as a torn write and cut from the file; malformed lines elsewhere are an
    /// error.
    pub async fn open(data_dir: impl AsRef<Path>) -> StorageResult<(Self, Records)> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir)
            .await
            .map_err(|e| StorageError::file_io(data_dir, e))?;

        let journal = Self {
            path: data_dir.join(JOURNAL_FILE),
        };
        let records = journal.replay().await?;
        Ok((journal, records))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn replay(&self) -> StorageResult<Records> {
        let mut records = Records::default();

        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(records),
            Err(e) => return Err(StorageError::file_io(&self.path, e)),
        };

        // Byte offset just past the last line that replayed cleanly.
        let mut good_end = 0;
        let mut offset = 0;
        let mut pending_error: Option<StorageError> = None;

        for (index, raw) in bytes.split_inclusive(|b| *b == b'\n').enumerate() {
            offset += raw.len();
            let line = String::from_utf8_lossy(raw);
            let trimmed = line.trim();
            if trimmed.is_empty() {
                if pending_error.is_none() {
                    good_end = offset;
                }
                continue;
            }
            if let Some(err) = pending_error.take() {
                return Err(err);
            }

            match serde_json::from_str::<StoreEvent>(trimmed) {
                Ok(event) => {
                    records.apply(event);
                    good_end = offset;
                }
                Err(e) => {
                    pending_error = Some(StorageError::file_deserialization(
                        &self.path,
                        index + 1,
                        e.to_string(),
                    ));
                }
            }
        }

        if pending_error.is_some() {
            warn!(
                path = %self.path.display(),
                offset = good_end,
                "Truncating torn journal entry"
            );
        }
        let needs_newline = good_end > 0 && bytes[good_end - 1] != b'\n';
        if good_end < bytes.len() || needs_newline {
            self.repair_tail(good_end as u64, needs_newline).await?;
        }

        Ok(records)
    }

    /// Cut the file back to `len` bytes and make sure it ends on a line break,
    /// so the next append starts a fresh line.
    async fn repair_tail(&self, len: u64, needs_newline: bool) -> StorageResult<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .open(&self.path)
            .await
            .map_err(|e| StorageError::file_io(&self.path, e))?;

        file.set_len(len)
            .await
            .map_err(|e| StorageError::file_io(&self.path, e))?;
        if needs_newline {
            file.seek(SeekFrom::End(0))
                .await
                .map_err(|e| StorageError::file_io(&self.path, e))?;
            file.write_all(b"\n")
                .await
                .map_err(|e| StorageError::file_io(&self.path, e))?;
        }
        file.sync_all()
            .await
            .map_err(|e| StorageError::file_io(&self.path, e))?;
        Ok(())
    }

    /// Append one event and fsync before returning.
    pub async fn append(&self, event: &StoreEvent) -> StorageResult<()> {
        let mut line =
            serde_json::to_string(event).map_err(|e| StorageError::serialization(e.to_string()))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| StorageError::file_io(&self.path, e))?;

        file.write_all(line.as_bytes())
            .await
            .map_err(|e| StorageError::file_io(&self.path, e))?;

        // fsync for durability
        file.sync_all()
            .await
            .map_err(|e| StorageError::file_io(&self.path, e))?;

        Ok(())
    }
}
