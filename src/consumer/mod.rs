pub mod command;
pub mod parallel;

use async_trait::async_trait;

use crate::app::Result;
use crate::domain::TrackedEntry;

pub use command::CommandAction;
pub use parallel::{ConsumeReport, ParallelConsumer, DEFAULT_WORKERS};

pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Work done for a claimed entry. An error releases the entry through
/// [`FeedTracker::fail`](crate::tracker::FeedTracker::fail).
#[async_trait]
pub trait ConsumeAction {
    async fn consume(&self, entry: &TrackedEntry) -> Result<()>;
}

/// Decides whether a failed entry goes back to pending or is aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    pub fn should_retry(&self, entry: &TrackedEntry) -> bool {
        entry.retries < self.max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EntryId;

    fn entry(retries: u32) -> TrackedEntry {
        TrackedEntry::new(EntryId::new("a").unwrap(), None, None, retries)
    }

    #[test]
    fn test_retry_policy_bounds() {
        let policy = RetryPolicy::new(2);
        assert!(policy.should_retry(&entry(0)));
        assert!(policy.should_retry(&entry(1)));
        assert!(!policy.should_retry(&entry(2)));
    }

    #[test]
    fn test_zero_retries_aborts_immediately() {
        assert!(!RetryPolicy::new(0).should_retry(&entry(0)));
    }
}
