// src/utils/lock.rs

//! Single-instance guard.
//!
//! Holds an exclusive advisory lock on `{data_dir}/notifier.lock` for as long
//! as the guard lives. Acquisition never blocks: a held lock is reported as
//! [`AppError::AlreadyRunning`].

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{AppError, Result};

const LOCK_FILE: &str = "notifier.lock";

/// An acquired instance lock, released on drop.
#[derive(Debug)]
pub struct InstanceLock {
    file: File,
    path: PathBuf,
}

impl InstanceLock {
    /// Try to acquire the lock inside `data_dir`, creating the directory if needed.
    pub fn acquire(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir)?;

        let path = data_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                log::debug!("Acquired instance lock {}", path.display());
                Ok(Self { file, path })
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                Err(AppError::AlreadyRunning(path))
            }
            Err(e) => Err(AppError::Io(e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            log::warn!("Failed to release lock {}: {}", self.path.display(), e);
        }
    }
}
