//! # samin
//!
//! samin manages read-only snapshots of btrfs subvolumes.
//!
//! ## Features
//!
//! - **Snapshots**: numbered, described, read-only snapshots per subvolume
//! - **Batch deletion**: ranges like `2,4-6`, mounted snapshots are left alone
//! - **Rollback**: swap the live subvolume for a snapshot, keeping the old
//!   state as a new snapshot
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//!
//! use samin::backend::BackendRegistry;
//! use samin::snapshot::{SaminConfig, SnapshotManager};
//!
//! # fn example() -> samin_common::SaminResult<()> {
//! let device = Path::new("/dev/sda2");
//! let manager =
//!     SnapshotManager::for_device(SaminConfig::default(), &BackendRegistry::with_defaults(), device)?;
//!
//! manager.create_config("@home", device)?;
//! let id = manager.take_snapshot("@home", device, Some("before upgrade"))?;
//! manager.rollback("@home", device, id)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod backend;
pub mod cli;
pub mod mount;
pub mod snapshot;

pub use snapshot::SnapshotManager;
