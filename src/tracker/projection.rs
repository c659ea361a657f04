//! Conversion between stored attributes and domain values.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

use crate::domain::{EntryId, EntryState, TrackedEntry};
use crate::store::Item;
use crate::tracker::{ABORTED, CONSUMED, CONSUMING, CREATED, FAILURES_COUNT, SEEN_AT};

/// Stored timestamps sort lexicographically in chronological order.
pub const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

pub fn format_timestamp(date_time: DateTime<Utc>) -> String {
    date_time.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .ok()
        .map(|dt| dt.and_utc())
}

/// Rebuilds a [`TrackedEntry`] from a stored item.
///
/// Absent or unparsable timestamps become `None` and an absent or
/// unparsable failure count becomes zero. Returns `None` only for an item
/// with an empty name, which no tracker write can produce.
pub fn to_tracked_entry(item: &Item) -> Option<TrackedEntry> {
    let id = match EntryId::new(item.name.clone()) {
        Ok(id) => id,
        Err(_) => {
            warn!("Skipping stored item with an empty name");
            return None;
        }
    };

    let retries = item
        .attribute(FAILURES_COUNT)
        .map(|v| {
            v.parse::<u32>().unwrap_or_else(|_| {
                warn!("Unparsable {} '{}' on {}, using 0", FAILURES_COUNT, v, id);
                0
            })
        })
        .unwrap_or(0);

    Some(TrackedEntry::new(
        id.clone(),
        timestamp_attribute(item, CREATED, &id),
        timestamp_attribute(item, SEEN_AT, &id),
        retries,
    ))
}

fn timestamp_attribute(item: &Item, name: &str, id: &EntryId) -> Option<DateTime<Utc>> {
    let value = item.attribute(name)?;
    let parsed = parse_timestamp(value);
    if parsed.is_none() {
        warn!("Unparsable {} '{}' on {}", name, value, id);
    }
    parsed
}

pub fn to_entry_state(item: Option<&Item>) -> EntryState {
    match item {
        None => EntryState::Unseen,
        Some(item) if item.has(CONSUMED) => EntryState::Consumed,
        Some(item) if item.has(ABORTED) => EntryState::Aborted,
        Some(item) if item.has(CONSUMING) => EntryState::Consuming,
        Some(_) => EntryState::Seen,
    }
}
