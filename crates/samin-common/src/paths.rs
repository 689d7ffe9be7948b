//! Control area path layout.
//!
//! ```text
//! <mountpoint>/                  top-level volume of the device
//!   <subvolume>                  live subvolume
//!   .samin/                      control area
//!     <subvolume>/
//!       snapshots/
//!         <id>/
//!           metadata.json
//!           snapshot/
//! ```

use std::path::{Component, Path, PathBuf};

use once_cell::sync::Lazy;

use crate::error::{SaminError, SaminResult};
use crate::id::SnapshotId;

/// Default control mountpoint.
pub static SAMIN_MOUNTPOINT: Lazy<PathBuf> = Lazy::new(|| {
    std::env::var("SAMIN_MOUNTPOINT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/run/samin"))
});

/// Name of the control area directory on the top-level volume.
pub const CONTROL_DIR: &str = ".samin";

/// Name of a record's metadata document.
pub const METADATA_FILE: &str = "metadata.json";

/// Name of a record's on-disk snapshot.
pub const SNAPSHOT_DIR: &str = "snapshot";

/// Paths used by samin, rooted at the control mountpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaminPaths {
    /// Where the top-level volume gets mounted (default: /run/samin).
    pub mountpoint: PathBuf,
}

impl SaminPaths {
    /// Create paths with the default mountpoint.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create paths with a custom mountpoint.
    #[must_use]
    pub fn with_mountpoint(mountpoint: impl Into<PathBuf>) -> Self {
        Self {
            mountpoint: mountpoint.into(),
        }
    }

    /// The control area.
    #[must_use]
    pub fn control_area(&self) -> PathBuf {
        self.mountpoint.join(CONTROL_DIR)
    }

    /// Config directory of a subvolume.
    #[must_use]
    pub fn subvolume_config(&self, subvolume: &str) -> PathBuf {
        self.control_area().join(subvolume)
    }

    /// Snapshot set directory of a subvolume.
    #[must_use]
    pub fn snapshots(&self, subvolume: &str) -> PathBuf {
        self.subvolume_config(subvolume).join("snapshots")
    }

    /// Directory of one snapshot record.
    #[must_use]
    pub fn snapshot_record(&self, subvolume: &str, id: SnapshotId) -> PathBuf {
        self.snapshots(subvolume).join(id.to_string())
    }

    /// Location of the live subvolume on the mounted top-level volume.
    #[must_use]
    pub fn live_subvolume(&self, subvolume: &str) -> PathBuf {
        self.mountpoint.join(subvolume)
    }

    /// Advisory lock file guarding the mountpoint.
    #[must_use]
    pub fn lock_file(&self) -> PathBuf {
        let mut name = self
            .mountpoint
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_else(|| "samin".into());
        name.push(".lock");
        self.mountpoint.with_file_name(name)
    }
}

impl Default for SaminPaths {
    fn default() -> Self {
        Self {
            mountpoint: SAMIN_MOUNTPOINT.clone(),
        }
    }
}

/// Check that a subvolume name is a plain relative path below the top level.
///
/// # Errors
///
/// Returns [`SaminError::InvalidSubvolume`] for empty, absolute, or
/// parent-escaping names, and for names that would land in the control area.
pub fn validate_subvolume(name: &str) -> SaminResult<()> {
    let invalid = || SaminError::InvalidSubvolume {
        name: name.to_string(),
    };

    let path = Path::new(name);
    let mut components = path.components().peekable();
    if components.peek().is_none() {
        return Err(invalid());
    }
    for component in components {
        match component {
            Component::Normal(_) => {}
            _ => return Err(invalid()),
        }
    }
    if path.starts_with(CONTROL_DIR) {
        return Err(invalid());
    }
    Ok(())
}
