//! Snapshot selector parsing.
//!
//! A selector is a comma-separated list of tokens, each either a single
//! identifier or an inclusive `start-end` range:
//! - "3" -> 3
//! - "2,4-6" -> 2, 4, 5, 6
//! - "1-1" -> 1
//!
//! Expansion keeps duplicates and input order.

use std::fmt;
use std::str::FromStr;

use crate::error::{SaminError, SaminResult};
use crate::id::SnapshotId;

/// One token of a selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorToken {
    /// A single identifier.
    Single(SnapshotId),
    /// An inclusive range, `start <= end`.
    Range(SnapshotId, SnapshotId),
}

/// A parsed snapshot selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotSelector {
    tokens: Vec<SelectorToken>,
}

impl SnapshotSelector {
    /// Widest range a single token may span.
    pub const MAX_RANGE_LEN: u64 = 65_536;

    /// Selector for exactly one identifier.
    #[must_use]
    pub fn single(id: SnapshotId) -> Self {
        Self {
            tokens: vec![SelectorToken::Single(id)],
        }
    }

    /// Parse a selector expression.
    ///
    /// # Errors
    ///
    /// Returns [`SaminError::InvalidSelector`] for empty tokens, non-numeric
    /// bounds, zero, or reversed ranges.
    pub fn parse(input: &str) -> SaminResult<Self> {
        let invalid = |reason: String| SaminError::InvalidSelector {
            selector: input.to_string(),
            reason,
        };

        let mut tokens = Vec::new();
        for raw in input.split(',') {
            let token = raw.trim();
            if token.is_empty() {
                return Err(invalid("empty token".to_string()));
            }

            match token.split_once('-') {
                Some((start, end)) => {
                    let start = parse_bound(start.trim()).map_err(&invalid)?;
                    let end = parse_bound(end.trim()).map_err(&invalid)?;
                    if start > end {
                        return Err(invalid(format!("range {start}-{end} is reversed")));
                    }
                    if end.get() - start.get() >= Self::MAX_RANGE_LEN {
                        return Err(invalid(format!(
                            "range {start}-{end} spans more than {} snapshots",
                            Self::MAX_RANGE_LEN
                        )));
                    }
                    tokens.push(SelectorToken::Range(start, end));
                }
                None => tokens.push(SelectorToken::Single(parse_bound(token).map_err(&invalid)?)),
            }
        }

        Ok(Self { tokens })
    }

    /// Expand into individual identifiers, in order, duplicates kept.
    #[must_use]
    pub fn expand(&self) -> Vec<SnapshotId> {
        let mut ids = Vec::new();
        for token in &self.tokens {
            match *token {
                SelectorToken::Single(id) => ids.push(id),
                SelectorToken::Range(start, end) => ids.extend(
                    (start.get()..=end.get()).filter_map(|n| SnapshotId::new(n).ok()),
                ),
            }
        }
        ids
    }
}

fn parse_bound(s: &str) -> Result<SnapshotId, String> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("`{s}` is not a snapshot number"));
    }
    let value: u64 = s
        .parse()
        .map_err(|_| format!("`{s}` is out of range"))?;
    SnapshotId::new(value).map_err(|_| "snapshot numbers start at 1".to_string())
}

impl From<SnapshotId> for SnapshotSelector {
    fn from(id: SnapshotId) -> Self {
        Self::single(id)
    }
}

impl FromStr for SnapshotSelector {
    type Err = SaminError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SnapshotSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, token) in self.tokens.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            match token {
                SelectorToken::Single(id) => write!(f, "{id}")?,
                SelectorToken::Range(start, end) => write!(f, "{start}-{end}")?,
            }
        }
        Ok(())
    }
}
