use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app::{Result, TrackerError};

/// Identifier of a feed entry. Doubles as the store's item name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntryId(String);

impl EntryId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(TrackerError::InvalidEntryId);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EntryId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for EntryId {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for EntryId {
    type Error = TrackerError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<EntryId> for String {
    fn from(id: EntryId) -> Self {
        id.0
    }
}

/// An entry as first observed by the feed poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenEntry {
    pub id: EntryId,
    pub date_time: DateTime<Utc>,
}

impl SeenEntry {
    pub fn new(id: EntryId, date_time: DateTime<Utc>) -> Self {
        Self { id, date_time }
    }
}

/// Projection of a stored entry record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedEntry {
    pub id: EntryId,
    pub created: Option<DateTime<Utc>>,
    pub seen_at: Option<DateTime<Utc>>,
    pub retries: u32,
}

impl TrackedEntry {
    pub fn new(
        id: EntryId,
        created: Option<DateTime<Utc>>,
        seen_at: Option<DateTime<Utc>>,
        retries: u32,
    ) -> Self {
        Self {
            id,
            created,
            seen_at,
            retries,
        }
    }
}

/// Lifecycle state, derived from which attributes are present on the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryState {
    /// No record exists.
    Unseen,
    /// Tracked and waiting for a consumer.
    Seen,
    /// Claimed by a worker.
    Consuming,
    Consumed,
    Aborted,
}

impl EntryState {
    pub fn is_terminal(self) -> bool {
        matches!(self, EntryState::Consumed | EntryState::Aborted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntryState::Unseen => "unseen",
            EntryState::Seen => "seen",
            EntryState::Consuming => "consuming",
            EntryState::Consumed => "consumed",
            EntryState::Aborted => "aborted",
        }
    }
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
