//! Storage abstractions for snapshot persistence.
//!
//! The snapshot is a key-value store of records keyed by id. It is loaded
//! whole, filled wholesale on the first run, and updated by id afterwards.
//! Each write call is all-or-nothing. Nothing is ever deleted.
//!
//! ## Directory Structure
//!
//! ```text
//! data/
//! ├── snapshot.json         # Last known records
//! └── notifier.lock         # Single-instance lock
//! ```

pub mod local;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{Record, Snapshot};

// Re-export for convenience
pub use local::LocalStorage;

/// On-disk form of the snapshot with an update timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotData {
    /// ISO 8601 timestamp of last update
    pub updated_at: DateTime<Utc>,
    /// Total record count
    pub count: usize,
    /// The records, ordered by id
    pub records: Vec<Record>,
}

impl SnapshotData {
    pub fn new(snapshot: Snapshot) -> Self {
        let records = snapshot.into_records();
        Self {
            updated_at: Utc::now(),
            count: records.len(),
            records,
        }
    }
}

/// Trait for snapshot storage backends.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load every stored record. An absent store reads as an empty snapshot.
    async fn load_all(&self) -> Result<Snapshot>;

    /// Store a batch of records (first run).
    async fn insert_many(&self, records: &[Record]) -> Result<()>;

    /// Replace the record stored under `record.id`, inserting it if the id is new.
    async fn update_one(&self, record: &Record) -> Result<()>;

    /// Apply several `update_one`s as a single write: either all land or none do.
    async fn update_many(&self, records: &[Record]) -> Result<()>;
}
