//! # samin-common
//!
//! Shared types for the samin snapshot manager.
//!
//! This crate provides functionality used by both the library and the CLI:
//! - Snapshot identifiers
//! - Snapshot selector (range expression) parsing
//! - The control area path layout
//! - The error taxonomy

#![warn(missing_docs)]

pub mod error;
pub mod id;
pub mod paths;
pub mod selector;

pub use error::{SaminError, SaminResult};
pub use id::SnapshotId;
pub use paths::SaminPaths;
pub use selector::SnapshotSelector;
