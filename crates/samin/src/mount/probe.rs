//! Filesystem type detection.

use std::path::Path;
use std::process::Command;

use samin_common::SaminResult;

/// Detects which filesystem a block device carries.
pub trait FilesystemProbe {
    /// The filesystem type of `device`, or `None` if it cannot be detected.
    fn filesystem_type(&self, device: &Path) -> SaminResult<Option<String>>;
}

/// [`FilesystemProbe`] that asks `blkid`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blkid;

impl FilesystemProbe for Blkid {
    fn filesystem_type(&self, device: &Path) -> SaminResult<Option<String>> {
        let output = Command::new("blkid")
            .args(["-o", "value", "-s", "TYPE"])
            .arg(device)
            .output()?;

        // blkid exits with 2 when nothing could be identified.
        if !output.status.success() {
            tracing::debug!(
                device = %device.display(),
                status = ?output.status.code(),
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "blkid could not identify device"
            );
            return Ok(None);
        }

        let fstype = parse_blkid_output(&output.stdout);
        tracing::debug!(device = %device.display(), fstype = ?fstype, "Detected filesystem");
        Ok(fstype)
    }
}

fn parse_blkid_output(stdout: &[u8]) -> Option<String> {
    let fstype = String::from_utf8_lossy(stdout).trim().to_string();
    (!fstype.is_empty()).then_some(fstype)
}
