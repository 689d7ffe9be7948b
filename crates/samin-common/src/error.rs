//! Error types for samin.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::id::SnapshotId;

/// Result type alias using [`SaminError`].
pub type SaminResult<T> = Result<T, SaminError>;

/// Errors raised while managing snapshots.
#[derive(Error, Diagnostic, Debug)]
pub enum SaminError {
    /// The device does not carry a supported filesystem.
    #[error("Filesystem of {device} is {found}, expected one of: {expected}")]
    #[diagnostic(
        code(samin::filesystem::mismatch),
        help("samin only operates on copy-on-write filesystems it has a backend for")
    )]
    FilesystemMismatch {
        /// The probed device.
        device: PathBuf,
        /// Supported filesystem types.
        expected: String,
        /// Detected filesystem type (or "unknown").
        found: String,
    },

    /// Mounting the control area failed.
    #[error("Failed to mount {device} at {target}: {source}")]
    #[diagnostic(code(samin::mount::failed))]
    MountFailure {
        /// The device being mounted.
        device: PathBuf,
        /// The mountpoint.
        target: PathBuf,
        /// The OS error.
        #[source]
        source: std::io::Error,
    },

    /// Unmounting the control area failed.
    #[error("Failed to unmount {target}: {source}")]
    #[diagnostic(
        code(samin::mount::unmount_failed),
        help("Check that no process is using the mountpoint, then unmount it manually")
    )]
    UnmountFailure {
        /// The mountpoint.
        target: PathBuf,
        /// The OS error.
        #[source]
        source: std::io::Error,
    },

    /// No configuration exists for the subvolume.
    #[error("No config found for subvolume {subvolume}")]
    #[diagnostic(
        code(samin::config::not_found),
        help("Run `samin create-config` for this subvolume first")
    )]
    ConfigNotFound {
        /// The subvolume name.
        subvolume: String,
    },

    /// The config could not be removed because snapshots remain.
    #[error("Config for subvolume {subvolume} still holds {remaining} snapshot(s)")]
    #[diagnostic(
        code(samin::config::not_empty),
        help("Unmount the remaining snapshots and run delete-config again")
    )]
    ConfigNotEmpty {
        /// The subvolume name.
        subvolume: String,
        /// Number of snapshots left behind.
        remaining: usize,
    },

    /// The snapshot does not exist.
    #[error("Snapshot #{id} not found for subvolume {subvolume}")]
    #[diagnostic(code(samin::snapshot::not_found))]
    SnapshotNotFound {
        /// The subvolume name.
        subvolume: String,
        /// The missing identifier.
        id: SnapshotId,
    },

    /// The snapshot is mounted and cannot be deleted.
    #[error("Not removing snapshot #{id}: snapshot is still mounted")]
    #[diagnostic(code(samin::snapshot::busy))]
    SnapshotBusy {
        /// The busy identifier.
        id: SnapshotId,
    },

    /// A snapshot's metadata document is missing or unreadable.
    #[error("Metadata of snapshot #{id} is corrupt: {reason}")]
    #[diagnostic(code(samin::snapshot::metadata_corrupt))]
    MetadataCorrupt {
        /// The affected identifier.
        id: SnapshotId,
        /// What went wrong.
        reason: String,
    },

    /// A native subvolume operation failed.
    #[error("Subvolume operation `{operation}` failed on {path}: {source}")]
    #[diagnostic(code(samin::backend::failed))]
    BackendFailure {
        /// The backend operation.
        operation: &'static str,
        /// The path it was applied to.
        path: PathBuf,
        /// The underlying cause.
        #[source]
        source: std::io::Error,
    },

    /// Rollback moved the live subvolume away but could not replace it.
    #[error("Rollback of {subvolume} is incomplete: the live subvolume was moved to {parked}")]
    #[diagnostic(
        code(samin::rollback::incomplete),
        help(
            "The subvolume is currently detached. Move the parked snapshot back to its original location before rebooting"
        )
    )]
    RollbackIncomplete {
        /// The subvolume name.
        subvolume: String,
        /// Where the pre-rollback subvolume now lives.
        parked: PathBuf,
        /// The failure that interrupted the rollback.
        #[source]
        source: Box<SaminError>,
    },

    /// A snapshot selector could not be parsed.
    #[error("Invalid snapshot selector `{selector}`: {reason}")]
    #[diagnostic(
        code(samin::selector::invalid),
        help("Use ids and inclusive ranges separated by commas, e.g. `2,4-6`")
    )]
    InvalidSelector {
        /// The offending input.
        selector: String,
        /// What went wrong.
        reason: String,
    },

    /// A snapshot identifier could not be parsed.
    #[error("Invalid snapshot id: {value}")]
    #[diagnostic(
        code(samin::snapshot::invalid_id),
        help("Snapshot ids are positive decimal integers without leading zeros")
    )]
    InvalidSnapshotId {
        /// The offending input.
        value: String,
    },

    /// A subvolume name is not a safe relative path.
    #[error("Invalid subvolume name: {name}")]
    #[diagnostic(
        code(samin::subvolume::invalid),
        help("Subvolume names are relative to the top-level volume and may not contain `..`")
    )]
    InvalidSubvolume {
        /// The offending name.
        name: String,
    },

    /// The device of a subvolume could not be discovered.
    #[error("Could not find the device holding subvolume {subvolume}")]
    #[diagnostic(
        code(samin::device::not_found),
        help("Pass the device explicitly with --device")
    )]
    DeviceNotFound {
        /// The subvolume name.
        subvolume: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(samin::io))]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    #[diagnostic(code(samin::serialization))]
    Serialization(String),
}

impl SaminError {
    /// Wrap an I/O error from a backend operation.
    #[must_use]
    pub fn backend(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::BackendFailure {
            operation,
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for SaminError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
