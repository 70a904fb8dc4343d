//! Local filesystem storage implementation.
//!
//! Keeps the snapshot as one JSON document and rewrites it atomically
//! (temp file, then rename) on every change.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! └── snapshot.json         # { updated_at, count, records }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{Record, Snapshot};
use crate::storage::{SnapshotData, SnapshotStore};

const SNAPSHOT_KEY: &str = "snapshot.json";

/// Local filesystem storage backend.
#[derive(Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Location of the snapshot document.
    pub fn snapshot_path(&self) -> PathBuf {
        self.path(SNAPSHOT_KEY)
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// The stored document with its timestamp, if one exists.
    pub async fn load_data(&self) -> Result<Option<SnapshotData>> {
        self.read_json(SNAPSHOT_KEY).await
    }

    /// Merge `records` into the stored snapshot with one atomic rewrite.
    async fn upsert_all<'a>(&self, records: impl IntoIterator<Item = &'a Record>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut snapshot = self.load_all().await?;
        for record in records {
            snapshot.upsert(record.clone());
        }
        self.save(snapshot).await
    }

    async fn save(&self, snapshot: Snapshot) -> Result<()> {
        let data = SnapshotData::new(snapshot);
        self.write_json(SNAPSHOT_KEY, &data).await?;
        log::debug!("Snapshot written: {} record(s)", data.count);
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for LocalStorage {
    async fn load_all(&self) -> Result<Snapshot> {
        match self.load_data().await? {
            Some(data) => {
                let snapshot: Snapshot = data.records.into_iter().collect();
                if snapshot.len() != data.count {
                    log::warn!(
                        "Snapshot count mismatch: header says {}, found {} unique record(s)",
                        data.count,
                        snapshot.len()
                    );
                }
                Ok(snapshot)
            }
            None => {
                log::info!("No snapshot found at {}", self.snapshot_path().display());
                Ok(Snapshot::new())
            }
        }
    }

    async fn insert_many(&self, records: &[Record]) -> Result<()> {
        self.upsert_all(records).await
    }

    async fn update_one(&self, record: &Record) -> Result<()> {
        self.upsert_all([record]).await
    }

    async fn update_many(&self, records: &[Record]) -> Result<()> {
        self.upsert_all(records).await
    }
}
