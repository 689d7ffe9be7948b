//! Snapshot metadata persistence.
//!
//! One directory per snapshot record under the subvolume's `snapshots/`
//! directory, named after the record's identifier, holding `metadata.json`
//! and the on-disk `snapshot/` subvolume.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use samin_common::paths::{METADATA_FILE, SNAPSHOT_DIR};
use samin_common::{SaminError, SaminPaths, SaminResult, SnapshotId};

use super::metadata::SnapshotMetadata;
use crate::backend::SubvolumeBackend;

/// A listed snapshot record.
///
/// An unreadable metadata document is reported on its own record and does
/// not hide the others.
#[derive(Debug)]
pub struct SnapshotEntry {
    /// Record identifier.
    pub id: SnapshotId,
    /// The record's metadata, or why it could not be read.
    pub metadata: SaminResult<SnapshotMetadata>,
}

/// Snapshot records of one subvolume.
///
/// The store never mounts anything; the control area must already be mounted.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    snapshots_dir: PathBuf,
}

impl MetadataStore {
    /// Store rooted at a `snapshots/` directory.
    pub fn new(snapshots_dir: impl Into<PathBuf>) -> Self {
        Self {
            snapshots_dir: snapshots_dir.into(),
        }
    }

    /// Store of `subvolume` under the control area.
    #[must_use]
    pub fn for_subvolume(paths: &SaminPaths, subvolume: &str) -> Self {
        Self::new(paths.snapshots(subvolume))
    }

    /// Whether the snapshot set exists at all.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.snapshots_dir.is_dir()
    }

    /// Directory of a record.
    #[must_use]
    pub fn record_dir(&self, id: SnapshotId) -> PathBuf {
        self.snapshots_dir.join(id.to_string())
    }

    /// Metadata document of a record.
    #[must_use]
    pub fn metadata_path(&self, id: SnapshotId) -> PathBuf {
        self.record_dir(id).join(METADATA_FILE)
    }

    /// On-disk snapshot of a record.
    #[must_use]
    pub fn snapshot_path(&self, id: SnapshotId) -> PathBuf {
        self.record_dir(id).join(SNAPSHOT_DIR)
    }

    /// Whether a record directory exists for `id`.
    #[must_use]
    pub fn contains(&self, id: SnapshotId) -> bool {
        self.record_dir(id).is_dir()
    }

    /// All record identifiers in ascending numeric order.
    ///
    /// Directory entries that are not canonical identifiers are ignored.
    pub fn ids(&self) -> SaminResult<Vec<SnapshotId>> {
        let mut ids = Vec::new();

        for entry in fs::read_dir(&self.snapshots_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            match name.to_str().map(str::parse::<SnapshotId>) {
                Some(Ok(id)) => ids.push(id),
                _ => tracing::warn!(
                    entry = %entry.path().display(),
                    "Ignoring unexpected entry in snapshot directory"
                ),
            }
        }

        ids.sort_unstable();
        Ok(ids)
    }

    /// Create the directory of a new record.
    ///
    /// # Errors
    ///
    /// Fails if the record already exists.
    pub fn create_record(&self, id: SnapshotId) -> SaminResult<PathBuf> {
        let dir = self.record_dir(id);
        fs::create_dir(&dir)?;
        tracing::debug!(id = %id, path = %dir.display(), "Created snapshot record directory");
        Ok(dir)
    }

    /// Write a record's metadata document.
    ///
    /// Records are written once; an existing document is never replaced.
    pub fn write(&self, id: SnapshotId, metadata: &SnapshotMetadata) -> SaminResult<()> {
        let path = self.metadata_path(id);
        fs::create_dir_all(self.record_dir(id))?;

        let json = serde_json::to_string_pretty(metadata)?;
        let mut file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;

        tracing::debug!(
            id = %id,
            path = %path.display(),
            description = %metadata.description,
            "Saved snapshot metadata"
        );
        Ok(())
    }

    /// Read a record's metadata document.
    ///
    /// # Errors
    ///
    /// Returns [`SaminError::MetadataCorrupt`] if the document is missing or
    /// does not parse.
    pub fn read(&self, id: SnapshotId) -> SaminResult<SnapshotMetadata> {
        let path = self.metadata_path(id);
        let corrupt = |reason: String| SaminError::MetadataCorrupt { id, reason };

        let json = fs::read_to_string(&path)
            .map_err(|e| corrupt(format!("cannot read {}: {e}", path.display())))?;
        let metadata = serde_json::from_str(&json)
            .map_err(|e| corrupt(format!("cannot parse {}: {e}", path.display())))?;

        tracing::debug!(id = %id, path = %path.display(), "Loaded snapshot metadata");
        Ok(metadata)
    }

    /// Every record in ascending identifier order.
    ///
    /// A record missing either its metadata document or its on-disk snapshot
    /// is listed with [`SaminError::MetadataCorrupt`].
    pub fn list(&self) -> SaminResult<Vec<SnapshotEntry>> {
        Ok(self
            .ids()?
            .into_iter()
            .map(|id| SnapshotEntry {
                id,
                metadata: self.load(id),
            })
            .collect())
    }

    fn load(&self, id: SnapshotId) -> SaminResult<SnapshotMetadata> {
        let metadata = self.read(id)?;
        let snapshot = self.snapshot_path(id);
        if snapshot.symlink_metadata().is_err() {
            return Err(SaminError::MetadataCorrupt {
                id,
                reason: format!("on-disk snapshot {} is missing", snapshot.display()),
            });
        }
        Ok(metadata)
    }

    /// Remove a record: the on-disk snapshot through `backend` first, then
    /// the record directory.
    pub fn delete(&self, id: SnapshotId, backend: &dyn SubvolumeBackend) -> SaminResult<()> {
        let snapshot = self.snapshot_path(id);
        if snapshot.symlink_metadata().is_ok() {
            backend.delete_subvolume(&snapshot)?;
        } else {
            tracing::warn!(id = %id, "Snapshot record has no on-disk snapshot");
        }

        let dir = self.record_dir(id);
        fs::remove_dir_all(&dir)?;
        tracing::debug!(id = %id, path = %dir.display(), "Deleted snapshot record");
        Ok(())
    }
}
