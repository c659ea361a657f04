pub mod attribute_tracker;
pub mod pending;
pub mod projection;

use crate::app::{Result, TrackerError};
use crate::domain::{EntryId, EntryState, SeenEntry, TrackedEntry};

pub use attribute_tracker::AttributeTracker;
pub use pending::PendingEntries;

// Attribute names on a stored entry record.
pub const CREATED: &str = "created";
pub const SEEN_AT: &str = "seen_at";
pub const CONSUMING: &str = "consuming";
pub const CONSUMED: &str = "consumed";
pub const FAILURES_COUNT: &str = "failures_count";
pub const ABORTED: &str = "aborted";

/// Outcome of trying to claim an entry for consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Claim {
    /// This caller holds the entry and may process it.
    Acquired,
    /// Another worker got there first. Skip the entry.
    AlreadyConsuming,
}

impl Claim {
    pub fn is_acquired(self) -> bool {
        self == Claim::Acquired
    }

    /// Turns lost contention into `TrackerError::AlreadyConsuming`.
    pub fn acquired(self, id: &EntryId) -> Result<()> {
        match self {
            Claim::Acquired => Ok(()),
            Claim::AlreadyConsuming => Err(TrackerError::AlreadyConsuming(id.clone())),
        }
    }
}

/// Consumption lifecycle of feed entries.
///
/// Every transition is a single conditional or unconditional write against
/// the entry's record; mutual exclusion between workers comes from the
/// store's conditional put on `consuming`, not from any in-process lock.
pub trait FeedTracker: Send + Sync {
    /// Record a newly observed entry. Re-tracking is a no-op.
    fn track(&self, entry: &SeenEntry) -> Result<()>;

    fn mark_as_consuming(&self, id: &EntryId) -> Result<Claim>;
    fn mark_as_consumed(&self, id: &EntryId) -> Result<()>;

    /// Release a claimed entry after a failed attempt. `entry.retries` must
    /// come from a fresh projection since the new count is derived from it.
    fn fail(&self, entry: &TrackedEntry, schedule_retry: bool) -> Result<()>;

    fn is_tracked(&self, id: &EntryId) -> Result<bool>;
    fn entry_state(&self, id: &EntryId) -> Result<EntryState>;
    fn tracked_entry(&self, id: &EntryId) -> Result<Option<TrackedEntry>>;

    /// Probe the store. Any failure comes back as `TrackerError::Connectivity`.
    fn check_connectivity(&self) -> Result<()>;

    /// One batch of pending entries, oldest `seen_at` first.
    fn entries_to_be_consumed(&self) -> Result<PendingEntries>;

    /// Entries currently held by a worker. `consuming` is never cleared by
    /// `mark_as_consumed`, so consumed entries are excluded here rather than
    /// counted by a bare not-null check on `consuming`.
    fn count_consuming(&self) -> Result<u64>;
    fn count_consumed(&self) -> Result<u64>;
    fn count_aborted(&self) -> Result<u64>;
}
