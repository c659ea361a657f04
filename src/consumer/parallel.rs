use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::app::{Result, TrackerError};
use crate::consumer::{ConsumeAction, RetryPolicy};
use crate::domain::{EntryId, TrackedEntry};
use crate::tracker::FeedTracker;

pub const DEFAULT_WORKERS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Consumed,
    Retried,
    Aborted,
    Skipped,
}

/// Tally of one consumer pass.
#[derive(Debug, Default)]
pub struct ConsumeReport {
    pub consumed: usize,
    pub retried: usize,
    pub aborted: usize,
    /// Claimed by another worker first.
    pub skipped: usize,
    pub errors: Vec<(EntryId, TrackerError)>,
}

impl ConsumeReport {
    pub fn total(&self) -> usize {
        self.consumed + self.retried + self.aborted + self.skipped + self.errors.len()
    }

    fn record(&mut self, id: EntryId, result: Result<Outcome>) {
        match result {
            Ok(Outcome::Consumed) => self.consumed += 1,
            Ok(Outcome::Retried) => self.retried += 1,
            Ok(Outcome::Aborted) => self.aborted += 1,
            Ok(Outcome::Skipped) => self.skipped += 1,
            Err(e) => self.errors.push((id, e)),
        }
    }
}

/// Consumes one batch of pending entries with a bounded number of
/// concurrent workers.
pub struct ParallelConsumer {
    action: Arc<dyn ConsumeAction + Send + Sync>,
    semaphore: Arc<Semaphore>,
    policy: RetryPolicy,
}

impl ParallelConsumer {
    pub fn new(action: Arc<dyn ConsumeAction + Send + Sync>) -> Self {
        Self::with_workers(action, DEFAULT_WORKERS, RetryPolicy::default())
    }

    pub fn with_workers(
        action: Arc<dyn ConsumeAction + Send + Sync>,
        workers: usize,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            action,
            semaphore: Arc::new(Semaphore::new(workers.max(1))),
            policy,
        }
    }

    pub async fn consume_pending<T: FeedTracker + 'static>(
        &self,
        tracker: Arc<T>,
    ) -> Result<ConsumeReport> {
        let entries: Vec<TrackedEntry> = tracker.entries_to_be_consumed()?.collect();
        let mut ids = Vec::with_capacity(entries.len());
        let mut handles = Vec::with_capacity(entries.len());

        for entry in entries {
            ids.push(entry.id.clone());
            let action = self.action.clone();
            let semaphore = self.semaphore.clone();
            let tracker = tracker.clone();
            let policy = self.policy;

            let handle = tokio::spawn(async move {
                match semaphore.acquire().await {
                    Ok(_permit) => {
                        consume_single(tracker.as_ref(), action.as_ref(), policy, entry).await
                    }
                    Err(e) => Err(TrackerError::Other(e.to_string())),
                }
            });

            handles.push(handle);
        }

        let mut report = ConsumeReport::default();
        let joined = futures::future::join_all(handles).await;
        for (id, joined) in ids.into_iter().zip(joined) {
            match joined {
                Ok(result) => report.record(id, result),
                Err(e) => {
                    error!("Task join error for {}: {}", id, e);
                    report.record(id, Err(TrackerError::Other(e.to_string())));
                }
            }
        }

        info!(
            "Consumer pass: {} consumed, {} retried, {} aborted, {} skipped, {} errors",
            report.consumed,
            report.retried,
            report.aborted,
            report.skipped,
            report.errors.len()
        );

        Ok(report)
    }
}

/// Claims, runs the action and settles the entry. Once the claim is held,
/// every exit either marks the entry consumed or releases it through `fail`.
async fn consume_single<T: FeedTracker + ?Sized>(
    tracker: &T,
    action: &(dyn ConsumeAction + Send + Sync),
    policy: RetryPolicy,
    entry: TrackedEntry,
) -> Result<Outcome> {
    if !tracker.mark_as_consuming(&entry.id)?.is_acquired() {
        return Ok(Outcome::Skipped);
    }

    // Re-read so the failure count reflects writes since the batch query
    let entry = match tracker.tracked_entry(&entry.id) {
        Ok(fresh) => fresh.unwrap_or(entry),
        Err(e) => {
            release_after_error(tracker, policy, &entry);
            return Err(e);
        }
    };

    let failure = match AssertUnwindSafe(action.consume(&entry)).catch_unwind().await {
        Ok(Ok(())) => match tracker.mark_as_consumed(&entry.id) {
            Ok(()) => return Ok(Outcome::Consumed),
            Err(e) => {
                release_after_error(tracker, policy, &entry);
                return Err(e);
            }
        },
        Ok(Err(e)) => e.to_string(),
        Err(_) => "consume action panicked".to_string(),
    };

    warn!(
        "Consuming {} failed (attempt {}): {}",
        entry.id,
        entry.retries.saturating_add(1),
        failure
    );
    release(tracker, policy, &entry)
}

fn release<T: FeedTracker + ?Sized>(
    tracker: &T,
    policy: RetryPolicy,
    entry: &TrackedEntry,
) -> Result<Outcome> {
    let retry = policy.should_retry(entry);
    tracker.fail(entry, retry)?;
    Ok(if retry {
        Outcome::Retried
    } else {
        Outcome::Aborted
    })
}

/// Releases a claim after a tracker error; the original error is what the
/// caller reports.
fn release_after_error<T: FeedTracker + ?Sized>(
    tracker: &T,
    policy: RetryPolicy,
    entry: &TrackedEntry,
) {
    if let Err(e) = release(tracker, policy, entry) {
        error!("Could not release {}: {}", entry.id, e);
    }
}
