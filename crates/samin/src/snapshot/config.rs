//! Snapshot manager configuration.

use std::path::PathBuf;

use samin_common::SaminPaths;

/// Description used when a snapshot is taken without one.
pub const DEFAULT_DESCRIPTION: &str = "No description given";

/// Snapshot manager configuration options.
#[derive(Debug, Clone)]
pub struct SaminConfig {
    /// Control mountpoint and the layout below it.
    pub paths: SaminPaths,
    /// Whether to hold the advisory lock during operations.
    pub lock: bool,
    /// Description for snapshots taken without one.
    pub default_description: String,
}

impl Default for SaminConfig {
    fn default() -> Self {
        Self {
            paths: SaminPaths::new(),
            lock: true,
            default_description: DEFAULT_DESCRIPTION.to_string(),
        }
    }
}

impl SaminConfig {
    /// Set the control mountpoint.
    #[must_use]
    pub fn with_mountpoint(mut self, mountpoint: impl Into<PathBuf>) -> Self {
        self.paths = SaminPaths::with_mountpoint(mountpoint);
        self
    }

    /// Enable or disable the advisory lock.
    #[must_use]
    pub const fn with_lock(mut self, lock: bool) -> Self {
        self.lock = lock;
        self
    }

    /// Set the default snapshot description.
    #[must_use]
    pub fn with_default_description(mut self, description: impl Into<String>) -> Self {
        self.default_description = description.into();
        self
    }
}
