use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::app::{Result, TrackerError};
use crate::domain::{Clock, EntryId, EntryState, SeenEntry, SystemClock, TrackedEntry};
use crate::store::{AttributeStore, Item, ReplaceableAttribute, Select, UpdateCondition};
use crate::tracker::pending::{
    aborted_select, consumed_select, consuming_select, pending_select, PendingEntries,
};
use crate::tracker::projection::{format_timestamp, to_entry_state, to_tracked_entry};
use crate::tracker::{
    Claim, FeedTracker, ABORTED, CONSUMED, CONSUMING, CREATED, FAILURES_COUNT, SEEN_AT,
};

/// [`FeedTracker`] that keeps each entry as one item of named attributes in
/// an [`AttributeStore`] domain.
pub struct AttributeTracker<S: AttributeStore> {
    store: S,
    domain: String,
    clock: Arc<dyn Clock>,
}

impl<S: AttributeStore> AttributeTracker<S> {
    /// Provisions `domain` if needed. No other store call may precede this.
    pub fn new(store: S, domain: impl Into<String>) -> Result<Self> {
        Self::with_clock(store, domain, Arc::new(SystemClock))
    }

    pub fn with_clock(store: S, domain: impl Into<String>, clock: Arc<dyn Clock>) -> Result<Self> {
        let domain = domain.into();
        store.ensure_domain(&domain)?;
        debug!("Using domain {}", domain);

        Ok(Self {
            store,
            domain,
            clock,
        })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    fn now(&self) -> String {
        format_timestamp(self.clock.now())
    }

    fn put(
        &self,
        id: &EntryId,
        attributes: &[ReplaceableAttribute],
        condition: Option<&UpdateCondition>,
    ) -> Result<()> {
        self.store
            .put_attributes(&self.domain, id.as_str(), attributes, condition)
    }

    fn find(&self, id: &EntryId) -> Result<Option<Item>> {
        let select = Select::from_domain(&self.domain).item(id.as_str()).limit(1);
        Ok(self.store.select(&select)?.into_iter().next())
    }
}

impl<S: AttributeStore> FeedTracker for AttributeTracker<S> {
    fn track(&self, entry: &SeenEntry) -> Result<()> {
        let seen = format_timestamp(entry.date_time);
        let attributes = [
            ReplaceableAttribute::if_absent(CREATED, seen.clone()),
            ReplaceableAttribute::replacing(SEEN_AT, seen),
        ];

        match self.put(&entry.id, &attributes, Some(&UpdateCondition::absent(SEEN_AT))) {
            Ok(()) => {
                debug!("Tracked entry {}", entry.id);
                Ok(())
            }
            Err(e) if e.is_conditional_check_failed() => {
                debug!("Entry {} already tracked", entry.id);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn mark_as_consuming(&self, id: &EntryId) -> Result<Claim> {
        let attributes = [ReplaceableAttribute::replacing(CONSUMING, self.now())];

        match self.put(id, &attributes, Some(&UpdateCondition::absent(CONSUMING))) {
            Ok(()) => {
                debug!("Claimed entry {}", id);
                Ok(Claim::Acquired)
            }
            Err(e) if e.is_conditional_check_failed() => {
                debug!("Entry {} is already being consumed", id);
                Ok(Claim::AlreadyConsuming)
            }
            Err(e) => Err(e),
        }
    }

    fn mark_as_consumed(&self, id: &EntryId) -> Result<()> {
        self.put(id, &[ReplaceableAttribute::replacing(CONSUMED, self.now())], None)?;
        debug!("Consumed entry {}", id);
        Ok(())
    }

    fn fail(&self, entry: &TrackedEntry, schedule_retry: bool) -> Result<()> {
        let now = self.now();

        if schedule_retry {
            let failures = entry.retries.saturating_add(1);
            self.put(
                &entry.id,
                &[
                    ReplaceableAttribute::replacing(FAILURES_COUNT, failures.to_string()),
                    ReplaceableAttribute::replacing(SEEN_AT, now),
                ],
                None,
            )?;
            debug!("Entry {} failed, retry {} scheduled", entry.id, failures);
        } else {
            self.put(&entry.id, &[ReplaceableAttribute::if_absent(ABORTED, now)], None)?;
            debug!("Entry {} aborted after {} retries", entry.id, entry.retries);
        }

        self.store
            .delete_attributes(&self.domain, entry.id.as_str(), &[CONSUMING])
    }

    fn is_tracked(&self, id: &EntryId) -> Result<bool> {
        Ok(self.find(id)?.is_some())
    }

    fn entry_state(&self, id: &EntryId) -> Result<EntryState> {
        Ok(to_entry_state(self.find(id)?.as_ref()))
    }

    fn tracked_entry(&self, id: &EntryId) -> Result<Option<TrackedEntry>> {
        Ok(self.find(id)?.as_ref().and_then(to_tracked_entry))
    }

    fn check_connectivity(&self) -> Result<()> {
        match self.store.domain_metadata(&self.domain) {
            Ok(metadata) => {
                info!(
                    "Store reachable, domain {} holds {} items",
                    self.domain, metadata.item_count
                );
                Ok(())
            }
            Err(e) => {
                warn!("Connectivity check against {} failed: {}", self.domain, e);
                Err(TrackerError::Connectivity(Box::new(e)))
            }
        }
    }

    fn entries_to_be_consumed(&self) -> Result<PendingEntries> {
        let items = self.store.select(&pending_select(&self.domain))?;
        Ok(PendingEntries::new(items))
    }

    fn count_consuming(&self) -> Result<u64> {
        self.store.count(&consuming_select(&self.domain))
    }

    fn count_consumed(&self) -> Result<u64> {
        self.store.count(&consumed_select(&self.domain))
    }

    fn count_aborted(&self) -> Result<u64> {
        self.store.count(&aborted_select(&self.domain))
    }
}
