//! Snapshot lifecycle.
//!
//! This module provides the [`SnapshotManager`] and the pieces it composes:
//! the per-subvolume metadata store, identifier allocation and the advisory
//! lock.

mod config;
mod lock;
mod manager;
pub mod metadata;
mod sequence;
mod store;

pub use config::{DEFAULT_DESCRIPTION, SaminConfig};
pub use lock::LockGuard;
pub use manager::{DeleteReport, SkippedSnapshot, SnapshotManager};
pub use metadata::SnapshotMetadata;
pub use sequence::next_id;
pub use store::{MetadataStore, SnapshotEntry};
