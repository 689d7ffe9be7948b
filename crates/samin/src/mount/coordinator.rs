//! Scoped mounting of the control mountpoint.

use std::path::{Path, PathBuf};

use samin_common::{SaminError, SaminResult};

use super::probe::FilesystemProbe;
use super::service::{MountOptions, MountService};

/// Keeps the device's top-level volume mounted at the control mountpoint for
/// the duration of one logical operation.
pub struct MountCoordinator {
    service: Box<dyn MountService>,
    probe: Box<dyn FilesystemProbe>,
    fstype: String,
    data: Option<String>,
}

impl std::fmt::Debug for MountCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountCoordinator")
            .field("fstype", &self.fstype)
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}

impl MountCoordinator {
    /// Create a coordinator that mounts `fstype` devices with `data` options.
    pub fn new(
        service: Box<dyn MountService>,
        probe: Box<dyn FilesystemProbe>,
        fstype: impl Into<String>,
        data: Option<&str>,
    ) -> Self {
        Self {
            service,
            probe,
            fstype: fstype.into(),
            data: data.map(str::to_string),
        }
    }

    /// The underlying mount service.
    #[must_use]
    pub fn service(&self) -> &dyn MountService {
        self.service.as_ref()
    }

    /// Mount the top-level volume of `device` at `mountpoint` unless something
    /// is already mounted there.
    ///
    /// # Errors
    ///
    /// Returns [`SaminError::FilesystemMismatch`] if `device` does not carry
    /// the expected filesystem and [`SaminError::MountFailure`] if the mount
    /// call fails.
    pub fn ensure_mounted(&self, device: &Path, mountpoint: &Path) -> SaminResult<()> {
        let found = self.probe.filesystem_type(device)?;
        if found.as_deref() != Some(self.fstype.as_str()) {
            return Err(SaminError::FilesystemMismatch {
                device: device.to_path_buf(),
                expected: self.fstype.clone(),
                found: found.unwrap_or_else(|| "unknown".to_string()),
            });
        }

        if self.service.is_mounted(mountpoint)? {
            tracing::debug!(mountpoint = %mountpoint.display(), "Control mountpoint already mounted");
            return Ok(());
        }

        std::fs::create_dir_all(mountpoint)?;
        self.service.mount(
            device,
            mountpoint,
            &MountOptions::top_level(&self.fstype, self.data.as_deref()),
        )?;

        tracing::debug!(
            device = %device.display(),
            mountpoint = %mountpoint.display(),
            "Mounted top-level volume"
        );
        Ok(())
    }

    /// Unmount `mountpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`SaminError::UnmountFailure`] if the mountpoint is busy.
    pub fn release(&self, mountpoint: &Path) -> SaminResult<()> {
        self.service.unmount(mountpoint)?;
        tracing::debug!(mountpoint = %mountpoint.display(), "Released control mountpoint");
        Ok(())
    }

    /// Mount and hand back a guard that releases the mount.
    ///
    /// Call [`MountGuard::release`] to observe unmount errors; a guard that is
    /// dropped instead still unmounts and logs any failure.
    pub fn acquire(&self, device: &Path, mountpoint: &Path) -> SaminResult<MountGuard<'_>> {
        self.ensure_mounted(device, mountpoint)?;
        Ok(MountGuard {
            coordinator: self,
            mountpoint: mountpoint.to_path_buf(),
            released: false,
        })
    }
}

/// An acquired control mount.
#[derive(Debug)]
#[must_use = "dropping the guard unmounts immediately"]
pub struct MountGuard<'a> {
    coordinator: &'a MountCoordinator,
    mountpoint: PathBuf,
    released: bool,
}

impl MountGuard<'_> {
    /// Unmount, reporting failure.
    pub fn release(mut self) -> SaminResult<()> {
        self.released = true;
        self.coordinator.release(&self.mountpoint)
    }
}

impl Drop for MountGuard<'_> {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = self.coordinator.release(&self.mountpoint) {
                tracing::error!(
                    mountpoint = %self.mountpoint.display(),
                    error = %e,
                    "Failed to release control mountpoint"
                );
            }
        }
    }
}
