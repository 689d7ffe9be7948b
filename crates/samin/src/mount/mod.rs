//! Mount handling.
//!
//! This module handles:
//! - Mount and unmount system calls
//! - Mount table parsing
//! - Filesystem type detection
//! - Scoped mounting of the control mountpoint

mod coordinator;
pub mod mountinfo;
mod probe;
mod service;

pub use coordinator::{MountCoordinator, MountGuard};
pub use mountinfo::MountEntry;
pub use probe::{Blkid, FilesystemProbe};
pub use service::{MountOptions, MountService, SystemMounts};
