//! Snapshot identifier allocation.

use samin_common::{SaminResult, SnapshotId};

/// The identifier for the next snapshot of a set.
///
/// `1` for an empty set, otherwise one past the numeric maximum. Identifiers
/// freed by deletions are never handed out again unless they were the maximum.
pub fn next_id(existing: impl IntoIterator<Item = SnapshotId>) -> SaminResult<SnapshotId> {
    let next = match existing.into_iter().max() {
        Some(max) => max.next()?,
        None => SnapshotId::FIRST,
    };
    tracing::debug!(id = %next, "Next snapshot number");
    Ok(next)
}
