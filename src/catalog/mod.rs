//! Catalog Module
//!
//! The record type and the store contract the regeneration pipeline consumes,
//! plus the SQLite adapter and the snapshot writer built on top of it.

pub mod sqlite;
pub mod snapshot;

pub use sqlite::SqliteRecordStore;
pub use snapshot::{read_snapshot, SnapshotWriter};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single catalog entry. Only `caption` is ever rewritten by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Store-assigned identifier, stable for the record's lifetime
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub quality: String,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub codec: String,
    #[serde(default)]
    pub file_type: String,
    /// Size of the media file in bytes
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub caption: String,
}

impl Record {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            language: String::new(),
            quality: String::new(),
            format: String::new(),
            codec: String::new(),
            file_type: String::new(),
            size: 0,
            caption: String::new(),
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = caption.into();
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }
}

/// Failures of the backing store itself. A missing record is not an error;
/// the store reports it as `Ok(None)`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store connection failed: {0}")]
    Connection(String),
    #[error("record store query failed: {0}")]
    Query(#[from] rusqlite::Error),
    #[error("record store worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Contract for the backing record store.
///
/// `update_caption` must be atomic per identifier and idempotent: writing the
/// same caption twice leaves the store in the same state as writing it once.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Total number of records
    async fn count(&self) -> Result<u64, StoreError>;

    /// A page of records in stable store order
    async fn fetch_page(&self, offset: u64, limit: usize) -> Result<Vec<Record>, StoreError>;

    async fn fetch_by_id(&self, id: &str) -> Result<Option<Record>, StoreError>;

    /// Overwrite the caption of `id`, returning the updated record or `None`
    /// when the record no longer exists.
    async fn update_caption(&self, id: &str, caption: &str) -> Result<Option<Record>, StoreError>;
}

/// Page through the whole store in `batch_size` chunks.
///
/// The page count is fixed by the initial `count()`; records inserted while
/// paging may or may not be included.
pub async fn fetch_all(store: &dyn RecordStore, batch_size: usize) -> Result<Vec<Record>, StoreError> {
    let total = store.count().await?;
    let batch_size = batch_size.max(1);
    let mut records = Vec::with_capacity(total as usize);
    let mut offset = 0u64;

    while offset < total {
        let page = store.fetch_page(offset, batch_size).await?;
        if page.is_empty() {
            break;
        }
        offset += page.len() as u64;
        records.extend(page);
    }

    Ok(records)
}
