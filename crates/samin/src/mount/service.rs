//! Mount operations.

use std::collections::BTreeSet;
use std::ffi::CString;
use std::path::{Path, PathBuf};

use samin_common::{SaminError, SaminResult};

use super::mountinfo::{self, MountEntry};

/// Mount options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountOptions {
    /// Filesystem type passed to the kernel.
    pub fstype: String,
    /// Filesystem-specific data (e.g. `subvolid=0`).
    pub data: Option<String>,
    /// Read-only mount.
    pub readonly: bool,
}

impl MountOptions {
    /// Read-write mount of the top-level volume.
    #[must_use]
    pub fn top_level(fstype: impl Into<String>, data: Option<&str>) -> Self {
        Self {
            fstype: fstype.into(),
            data: data.map(str::to_string),
            readonly: false,
        }
    }
}

/// The mount primitives samin needs from the host.
pub trait MountService {
    /// Whether `path` is currently a mount point.
    fn is_mounted(&self, path: &Path) -> SaminResult<bool>;

    /// Mount `device` at `target`.
    fn mount(&self, device: &Path, target: &Path, options: &MountOptions) -> SaminResult<()>;

    /// Unmount `target`.
    fn unmount(&self, target: &Path) -> SaminResult<()>;

    /// Subvolume ids of every current mount of `device`.
    fn mounted_subvolume_ids(&self, device: &Path) -> SaminResult<BTreeSet<u64>>;
}

/// [`MountService`] backed by the running kernel.
#[derive(Debug, Clone)]
pub struct SystemMounts {
    mountinfo: PathBuf,
}

impl Default for SystemMounts {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemMounts {
    /// Read mounts from `/proc/self/mountinfo`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_mountinfo("/proc/self/mountinfo")
    }

    /// Read mounts from a different mountinfo table.
    #[must_use]
    pub fn with_mountinfo(path: impl Into<PathBuf>) -> Self {
        Self {
            mountinfo: path.into(),
        }
    }

    /// Current mount table.
    pub fn entries(&self) -> SaminResult<Vec<MountEntry>> {
        let table = std::fs::read_to_string(&self.mountinfo)?;
        Ok(mountinfo::parse(&table))
    }

    /// Find the device holding a mounted subvolume of `fstype`.
    ///
    /// Matches a mount whose root is `/<subvolume>`.
    pub fn device_of_subvolume(&self, subvolume: &str, fstype: &str) -> SaminResult<PathBuf> {
        let root = Path::new("/").join(subvolume);
        self.entries()?
            .into_iter()
            .find(|entry| entry.fstype == fstype && entry.root == root)
            .map(|entry| PathBuf::from(entry.source))
            .ok_or_else(|| SaminError::DeviceNotFound {
                subvolume: subvolume.to_string(),
            })
    }
}

fn to_cstring(value: &str) -> std::io::Result<CString> {
    CString::new(value).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
}

impl MountService for SystemMounts {
    fn is_mounted(&self, path: &Path) -> SaminResult<bool> {
        let Ok(path) = path.canonicalize() else {
            return Ok(false);
        };
        Ok(self.entries()?.iter().any(|entry| entry.mountpoint == path))
    }

    fn mount(&self, device: &Path, target: &Path, options: &MountOptions) -> SaminResult<()> {
        use rustix::mount::{MountFlags, mount};

        tracing::debug!(
            device = %device.display(),
            target = %target.display(),
            ?options,
            "Mounting filesystem"
        );

        let failure = |source: std::io::Error| SaminError::MountFailure {
            device: device.to_path_buf(),
            target: target.to_path_buf(),
            source,
        };

        let fstype_c = to_cstring(&options.fstype).map_err(failure)?;
        let data_c = to_cstring(options.data.as_deref().unwrap_or("")).map_err(failure)?;

        let mut flags = MountFlags::empty();
        if options.readonly {
            flags |= MountFlags::RDONLY;
        }

        mount(device, target, fstype_c.as_c_str(), flags, data_c.as_c_str())
            .map_err(|e| failure(e.into()))?;

        tracing::debug!(target = %target.display(), "Filesystem mounted");
        Ok(())
    }

    fn unmount(&self, target: &Path) -> SaminResult<()> {
        use rustix::mount::{UnmountFlags, unmount};

        tracing::debug!(target = %target.display(), "Unmounting filesystem");

        unmount(target, UnmountFlags::empty()).map_err(|e| SaminError::UnmountFailure {
            target: target.to_path_buf(),
            source: e.into(),
        })?;

        Ok(())
    }

    fn mounted_subvolume_ids(&self, device: &Path) -> SaminResult<BTreeSet<u64>> {
        Ok(self
            .entries()?
            .iter()
            .filter(|entry| entry.is_from_device(device))
            .filter_map(MountEntry::subvolume_id)
            .collect())
    }
}
