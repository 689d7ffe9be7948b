//! Snapshot metadata documents.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp format of `metadata.json`. UTC, no zone suffix.
pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// The `metadata.json` of one snapshot record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// Creation time, second precision.
    #[serde(with = "utc_seconds")]
    pub date: DateTime<Utc>,
    /// Free-text description.
    pub description: String,
}

impl SnapshotMetadata {
    /// Metadata stamped with the current time.
    #[must_use]
    pub fn now(description: impl Into<String>) -> Self {
        Self::at(Utc::now(), description)
    }

    /// Metadata stamped with `date`, truncated to whole seconds.
    #[must_use]
    pub fn at(date: DateTime<Utc>, description: impl Into<String>) -> Self {
        Self {
            date: date.trunc_subsecs(0),
            description: description.into(),
        }
    }
}

mod utc_seconds {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    use super::DATE_FORMAT;

    pub fn serialize<S: Serializer>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&date.format(DATE_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, DATE_FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}
