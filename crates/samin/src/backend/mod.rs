//! Subvolume backends.
//!
//! A backend wraps the native subvolume primitives of one copy-on-write
//! filesystem. The backend is picked once at startup from the detected
//! filesystem type through a [`BackendRegistry`].

mod btrfs;

use std::collections::BTreeMap;
use std::path::Path;

use samin_common::{SaminError, SaminResult};

pub use btrfs::BtrfsBackend;

/// Native subvolume primitives.
///
/// Errors surface as [`SaminError::BackendFailure`].
pub trait SubvolumeBackend {
    /// Filesystem type this backend handles, as reported by the probe.
    fn filesystem(&self) -> &'static str;

    /// Mount data that selects the top-level volume.
    fn top_level_mount_data(&self) -> Option<&'static str>;

    /// Create an empty subvolume at `path`.
    fn create_subvolume(&self, path: &Path) -> SaminResult<()>;

    /// Snapshot `source` to `dest`.
    fn create_snapshot(&self, source: &Path, dest: &Path, read_only: bool) -> SaminResult<()>;

    /// Delete the subvolume at `path`.
    fn delete_subvolume(&self, path: &Path) -> SaminResult<()>;

    /// Internal id of the subvolume at `path`.
    fn subvolume_id(&self, path: &Path) -> SaminResult<u64>;
}

impl std::fmt::Debug for dyn SubvolumeBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SubvolumeBackend({})", self.filesystem())
    }
}

type BackendFactory = fn() -> Box<dyn SubvolumeBackend>;

fn btrfs_backend() -> Box<dyn SubvolumeBackend> {
    Box::new(BtrfsBackend::new())
}

/// Maps detected filesystem types to backend constructors.
#[derive(Debug, Clone, Default)]
pub struct BackendRegistry {
    factories: BTreeMap<&'static str, BackendFactory>,
}

impl BackendRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in backend.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("btrfs", btrfs_backend);
        registry
    }

    /// Register a backend for `fstype`, replacing any previous one.
    pub fn register(&mut self, fstype: &'static str, factory: BackendFactory) {
        self.factories.insert(fstype, factory);
    }

    /// Supported filesystem types.
    pub fn supported(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.keys().copied()
    }

    /// Build the backend for a detected filesystem type.
    ///
    /// # Errors
    ///
    /// Returns [`SaminError::FilesystemMismatch`] if no backend handles
    /// `fstype`.
    pub fn select(&self, device: &Path, fstype: Option<&str>) -> SaminResult<Box<dyn SubvolumeBackend>> {
        let factory = fstype.and_then(|t| self.factories.get(t)).ok_or_else(|| {
            SaminError::FilesystemMismatch {
                device: device.to_path_buf(),
                expected: self.supported().collect::<Vec<_>>().join(", "),
                found: fstype.unwrap_or("unknown").to_string(),
            }
        })?;

        let backend = factory();
        tracing::debug!(
            device = %device.display(),
            filesystem = backend.filesystem(),
            "Selected subvolume backend"
        );
        Ok(backend)
    }
}
