//! Snapshot identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU64;
use std::str::FromStr;

use crate::error::{SaminError, SaminResult};

/// A snapshot identifier.
///
/// Identifiers are strictly positive and unique within one subvolume's
/// snapshot set. Their textual form is the decimal number without leading
/// zeros; that form is also the name of the snapshot's directory.
///
/// Ordering is numeric, so `10` sorts after `9`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(NonZeroU64);

impl SnapshotId {
    /// The first identifier handed out in an empty snapshot set.
    pub const FIRST: Self = Self(NonZeroU64::MIN);

    /// Create an identifier from its numeric value.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` is zero.
    pub fn new(value: u64) -> SaminResult<Self> {
        NonZeroU64::new(value)
            .map(Self)
            .ok_or_else(|| SaminError::InvalidSnapshotId {
                value: value.to_string(),
            })
    }

    /// Get the numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }

    /// The identifier following this one.
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier space is exhausted.
    pub fn next(self) -> SaminResult<Self> {
        self.0
            .checked_add(1)
            .map(Self)
            .ok_or_else(|| SaminError::InvalidSnapshotId {
                value: format!("{}+1", self.0),
            })
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SnapshotId {
    type Err = SaminError;

    /// Parse the canonical textual form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SaminError::InvalidSnapshotId {
            value: s.to_string(),
        };

        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) || s.starts_with('0') {
            return Err(invalid());
        }

        let value: u64 = s.parse().map_err(|_| invalid())?;
        Self::new(value)
    }
}

impl From<SnapshotId> for u64 {
    fn from(id: SnapshotId) -> Self {
        id.get()
    }
}
