//! Rendering of snapshot listings.

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tabled::{Table, Tabled};

use crate::snapshot::SnapshotEntry;

/// Date format of the listing table.
pub const DISPLAY_FORMAT: &str = "%a %b %d %Y %H:%M:%S %p";

#[derive(Tabled)]
struct SnapshotRow {
    #[tabled(rename = "No.")]
    number: String,
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Description")]
    description: String,
}

#[derive(Serialize)]
struct SnapshotJson {
    number: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Format a snapshot date in local time, or in UTC if `utc` is set.
#[must_use]
pub fn format_date(date: DateTime<Utc>, utc: bool) -> String {
    if utc {
        date.format(DISPLAY_FORMAT).to_string()
    } else {
        date.with_timezone(&Local).format(DISPLAY_FORMAT).to_string()
    }
}

/// Render entries as a table. Corrupt records show their error.
#[must_use]
pub fn render_table(entries: &[SnapshotEntry], utc: bool) -> String {
    let rows = entries.iter().map(|entry| match &entry.metadata {
        Ok(metadata) => SnapshotRow {
            number: entry.id.to_string(),
            date: format_date(metadata.date, utc),
            description: metadata.description.clone(),
        },
        Err(e) => SnapshotRow {
            number: entry.id.to_string(),
            date: "-".to_string(),
            description: format!("<{e}>"),
        },
    });
    Table::new(rows).to_string()
}

/// Render entries as a JSON array with RFC 3339 UTC dates.
pub fn render_json(entries: &[SnapshotEntry]) -> serde_json::Result<String> {
    let rows: Vec<SnapshotJson> = entries
        .iter()
        .map(|entry| match &entry.metadata {
            Ok(metadata) => SnapshotJson {
                number: entry.id.get(),
                date: Some(metadata.date),
                description: Some(metadata.description.clone()),
                error: None,
            },
            Err(e) => SnapshotJson {
                number: entry.id.get(),
                date: None,
                description: None,
                error: Some(e.to_string()),
            },
        })
        .collect();
    serde_json::to_string_pretty(&rows)
}
