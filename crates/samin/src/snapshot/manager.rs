//! Snapshot lifecycle management.

use std::fs;
use std::path::Path;

use samin_common::paths::validate_subvolume;
use samin_common::{SaminError, SaminResult, SnapshotId, SnapshotSelector};

use super::config::SaminConfig;
use super::lock::LockGuard;
use super::metadata::SnapshotMetadata;
use super::sequence::next_id;
use super::store::{MetadataStore, SnapshotEntry};
use crate::backend::{BackendRegistry, SubvolumeBackend};
use crate::mount::{Blkid, FilesystemProbe, MountCoordinator, MountService, SystemMounts};

/// A snapshot left in place by a batch delete.
#[derive(Debug)]
pub struct SkippedSnapshot {
    /// The identifier that was not deleted.
    pub id: SnapshotId,
    /// Why.
    pub reason: SaminError,
}

/// Outcome of deleting a batch of snapshots.
#[derive(Debug, Default)]
pub struct DeleteReport {
    /// Deleted identifiers, in the order they were processed.
    pub deleted: Vec<SnapshotId>,
    /// Identifiers that were skipped.
    pub skipped: Vec<SkippedSnapshot>,
}

impl DeleteReport {
    /// Whether every selected snapshot was deleted.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Creates, lists, deletes and rolls back snapshots of subvolumes on one
/// filesystem type.
///
/// Each public operation holds the control mount (and, if configured, the
/// advisory lock) for its whole duration and releases it on every exit path.
#[derive(Debug)]
pub struct SnapshotManager {
    config: SaminConfig,
    backend: Box<dyn SubvolumeBackend>,
    mounts: MountCoordinator,
}

impl SnapshotManager {
    /// Create a manager from its collaborators.
    pub fn new(
        config: SaminConfig,
        backend: Box<dyn SubvolumeBackend>,
        mounts: Box<dyn MountService>,
        probe: Box<dyn FilesystemProbe>,
    ) -> Self {
        let mounts = MountCoordinator::new(
            mounts,
            probe,
            backend.filesystem(),
            backend.top_level_mount_data(),
        );
        Self {
            config,
            backend,
            mounts,
        }
    }

    /// Create a manager for `device` on the running system, picking the
    /// backend that matches the device's filesystem.
    ///
    /// # Errors
    ///
    /// Returns [`SaminError::FilesystemMismatch`] if no registered backend
    /// handles the device.
    pub fn for_device(
        config: SaminConfig,
        registry: &BackendRegistry,
        device: &Path,
    ) -> SaminResult<Self> {
        let fstype = Blkid.filesystem_type(device)?;
        let backend = registry.select(device, fstype.as_deref())?;
        Ok(Self::new(
            config,
            backend,
            Box::new(SystemMounts::new()),
            Box::new(Blkid),
        ))
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &SaminConfig {
        &self.config
    }

    /// The subvolume backend.
    #[must_use]
    pub fn backend(&self) -> &dyn SubvolumeBackend {
        self.backend.as_ref()
    }

    /// Create the control area if needed and an empty snapshot set for
    /// `subvolume`. Running it again is harmless.
    pub fn create_config(&self, subvolume: &str, device: &Path) -> SaminResult<()> {
        validate_subvolume(subvolume)?;
        self.with_mount(device, || {
            let control = self.config.paths.control_area();
            if !control.exists() {
                tracing::debug!(path = %control.display(), "Creating control area");
                self.backend.create_subvolume(&control)?;
            }

            let snapshots = self.config.paths.snapshots(subvolume);
            fs::create_dir_all(&snapshots)?;
            tracing::info!(subvolume, path = %snapshots.display(), "Config created");
            Ok(())
        })
    }

    /// Delete every snapshot of `subvolume`, then its config.
    ///
    /// # Errors
    ///
    /// Returns [`SaminError::ConfigNotFound`] if there is no config, and
    /// [`SaminError::ConfigNotEmpty`] if some snapshots could not be deleted.
    pub fn delete_config(&self, subvolume: &str, device: &Path) -> SaminResult<()> {
        validate_subvolume(subvolume)?;
        self.with_mount(device, || {
            let store = self.existing_store(subvolume)?;
            let ids = store.ids()?;
            let report = self.delete_records(subvolume, &store, device, &ids)?;

            if !report.is_complete() {
                return Err(SaminError::ConfigNotEmpty {
                    subvolume: subvolume.to_string(),
                    remaining: report.skipped.len(),
                });
            }

            let config_dir = self.config.paths.subvolume_config(subvolume);
            fs::remove_dir_all(&config_dir)?;
            tracing::info!(subvolume, deleted = report.deleted.len(), "Config deleted");
            Ok(())
        })
    }

    /// Take a read-only snapshot of the live subvolume.
    ///
    /// If the metadata write fails after the snapshot was created, the
    /// snapshot stays on disk without metadata and is listed as corrupt.
    pub fn take_snapshot(
        &self,
        subvolume: &str,
        device: &Path,
        description: Option<&str>,
    ) -> SaminResult<SnapshotId> {
        validate_subvolume(subvolume)?;
        let description = description.unwrap_or(self.config.default_description.as_str());

        self.with_mount(device, || {
            let store = self.existing_store(subvolume)?;
            let id = next_id(store.ids()?)?;
            let record = store.create_record(id)?;

            let live = self.config.paths.live_subvolume(subvolume);
            let snapshot = store.snapshot_path(id);
            tracing::debug!(id = %id, path = %snapshot.display(), "Taking snapshot");
            if let Err(e) = self.backend.create_snapshot(&live, &snapshot, true) {
                // nothing was created, give the number back
                discard_record(&record);
                return Err(e);
            }

            if let Err(e) = store.write(id, &SnapshotMetadata::now(description)) {
                tracing::error!(
                    id = %id,
                    snapshot = %snapshot.display(),
                    error = %e,
                    "Snapshot was created but its metadata could not be written"
                );
                return Err(e);
            }

            tracing::info!(subvolume, id = %id, description, "Snapshot taken");
            Ok(id)
        })
    }

    /// All snapshots of `subvolume` in ascending identifier order.
    ///
    /// An empty result means the subvolume has no snapshots.
    pub fn list_snapshots(&self, subvolume: &str, device: &Path) -> SaminResult<Vec<SnapshotEntry>> {
        validate_subvolume(subvolume)?;
        self.with_mount(device, || self.existing_store(subvolume)?.list())
    }

    /// Delete the snapshots picked by `selector`.
    ///
    /// Snapshots that are mounted somewhere, or that do not exist, are skipped
    /// and reported; the rest of the batch still proceeds. Backend failures
    /// abort the batch.
    pub fn delete_snapshots(
        &self,
        subvolume: &str,
        device: &Path,
        selector: &SnapshotSelector,
    ) -> SaminResult<DeleteReport> {
        validate_subvolume(subvolume)?;
        self.with_mount(device, || {
            let store = self.existing_store(subvolume)?;
            self.delete_records(subvolume, &store, device, &selector.expand())
        })
    }

    /// Replace the live subvolume with a writable snapshot of `target`.
    ///
    /// The pre-rollback subvolume is kept as a new snapshot described as
    /// `rolled back to <target>`; its identifier is returned. Existing mounts
    /// of the subvolume keep seeing the old state until remounted.
    ///
    /// # Errors
    ///
    /// Returns [`SaminError::SnapshotNotFound`] if `target` does not exist and
    /// [`SaminError::RollbackIncomplete`] if the live subvolume was moved away
    /// but the replacement could not be created.
    pub fn rollback(&self, subvolume: &str, device: &Path, target: SnapshotId) -> SaminResult<SnapshotId> {
        validate_subvolume(subvolume)?;
        self.with_mount(device, || {
            let store = self.existing_store(subvolume)?;
            let source = store.snapshot_path(target);
            if !store.contains(target) || !source.exists() {
                return Err(SaminError::SnapshotNotFound {
                    subvolume: subvolume.to_string(),
                    id: target,
                });
            }

            let id = next_id(store.ids()?)?;
            let record = store.create_record(id)?;
            if let Err(e) = store.write(id, &SnapshotMetadata::now(format!("rolled back to {target}"))) {
                discard_record(&record);
                return Err(e);
            }

            let live = self.config.paths.live_subvolume(subvolume);
            let parked = store.snapshot_path(id);
            tracing::debug!(
                from = %live.display(),
                to = %parked.display(),
                "Moving old subvolume"
            );
            if let Err(e) = fs::rename(&live, &parked) {
                // the live subvolume was not touched
                discard_record(&record);
                return Err(e.into());
            }

            tracing::debug!(
                from = %source.display(),
                to = %live.display(),
                "Generating new subvolume from snapshot"
            );
            if let Err(e) = self.backend.create_snapshot(&source, &live, false) {
                tracing::error!(
                    subvolume,
                    parked = %parked.display(),
                    error = %e,
                    "Rollback left the subvolume detached"
                );
                return Err(SaminError::RollbackIncomplete {
                    subvolume: subvolume.to_string(),
                    parked,
                    source: Box::new(e),
                });
            }

            tracing::info!(subvolume, target = %target, saved_as = %id, "Rolled back");
            Ok(id)
        })
    }

    /// Run `body` with the lock held and the control area mounted.
    fn with_mount<T>(&self, device: &Path, body: impl FnOnce() -> SaminResult<T>) -> SaminResult<T> {
        let _lock = if self.config.lock {
            Some(LockGuard::acquire(&self.config.paths.lock_file())?)
        } else {
            None
        };

        let guard = self.mounts.acquire(device, &self.config.paths.mountpoint)?;
        let result = body();
        let released = guard.release();

        match (result, released) {
            (Ok(value), Ok(())) => Ok(value),
            (Err(e), Ok(())) | (Ok(_), Err(e)) => Err(e),
            (Err(e), Err(unmount)) => {
                tracing::error!(error = %unmount, "Failed to release control mountpoint");
                Err(e)
            }
        }
    }

    fn existing_store(&self, subvolume: &str) -> SaminResult<MetadataStore> {
        let store = MetadataStore::for_subvolume(&self.config.paths, subvolume);
        if !store.exists() {
            return Err(SaminError::ConfigNotFound {
                subvolume: subvolume.to_string(),
            });
        }
        Ok(store)
    }

    /// Delete records without touching the mount; callers hold it already.
    fn delete_records(
        &self,
        subvolume: &str,
        store: &MetadataStore,
        device: &Path,
        ids: &[SnapshotId],
    ) -> SaminResult<DeleteReport> {
        let mounted = self.mounts.service().mounted_subvolume_ids(device)?;
        let mut report = DeleteReport::default();

        for &id in ids {
            if !store.contains(id) {
                tracing::warn!(id = %id, "Not removing snapshot: no such snapshot");
                report.skipped.push(SkippedSnapshot {
                    id,
                    reason: SaminError::SnapshotNotFound {
                        subvolume: subvolume.to_string(),
                        id,
                    },
                });
                continue;
            }

            let snapshot = store.snapshot_path(id);
            if snapshot.exists() && mounted.contains(&self.backend.subvolume_id(&snapshot)?) {
                let reason = SaminError::SnapshotBusy { id };
                tracing::error!("{reason}");
                report.skipped.push(SkippedSnapshot { id, reason });
                continue;
            }

            tracing::debug!(id = %id, path = %store.record_dir(id).display(), "Deleting snapshot");
            store.delete(id, self.backend.as_ref())?;
            report.deleted.push(id);
        }

        Ok(report)
    }
}

/// Remove the directory of a record that never got its snapshot.
fn discard_record(record: &Path) {
    if let Err(e) = fs::remove_dir_all(record) {
        tracing::warn!(
            path = %record.display(),
            error = %e,
            "Failed to remove unused snapshot record"
        );
    }
}
