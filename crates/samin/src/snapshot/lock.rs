//! Advisory locking across samin invocations.
//!
//! Every invocation mounts and unmounts the same control mountpoint, so one
//! exclusive `flock(2)` next to it serializes all operations. The lock is
//! released on drop.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use rustix::fs::{FlockOperation, flock};
use samin_common::SaminResult;

/// A held exclusive lock.
#[derive(Debug)]
pub struct LockGuard {
    file: File,
    path: PathBuf,
}

impl LockGuard {
    /// Take the lock at `path`, waiting for other holders.
    pub fn acquire(path: &Path) -> SaminResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)?;

        if flock(&file, FlockOperation::NonBlockingLockExclusive).is_err() {
            tracing::info!(path = %path.display(), "Waiting for another samin process");
            flock(&file, FlockOperation::LockExclusive).map_err(std::io::Error::from)?;
        }

        tracing::debug!(path = %path.display(), "Acquired lock");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = flock(&self.file, FlockOperation::Unlock) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to release lock");
        }
    }
}
