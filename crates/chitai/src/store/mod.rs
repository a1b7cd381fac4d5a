//! Durable records behind the session core.
//!
//! The session core consumes storage through two narrow traits:
//!
//! - [`ItemResolver`] maps `(text, language)` to a deduplicated content item.
//! - [`PersistenceGateway`] records session start/end and the
//!   queued → displayed → completed timeline of each session item.
//!
//! [`RecordStore`] implements both on top of a [`Records`] projection. It runs
//! purely in memory, or with a [`FileJournal`] that appends every change to a
//! JSONL file and replays it on startup.

mod error;
mod gateway;
mod journal;
mod record_store;
mod records;

pub use error::{StorageError, StorageResult};
pub use gateway::{ItemResolver, PersistenceGateway, Placement};
pub use journal::{FileJournal, JOURNAL_FILE};
pub use record_store::RecordStore;
pub use records::{ItemRecord, Records, SessionItemRecord, SessionRecord, StoreEvent};
