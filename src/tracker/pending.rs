use crate::domain::TrackedEntry;
use crate::store::{Item, Select, MAX_SELECT_LIMIT};
use crate::tracker::projection::to_tracked_entry;
use crate::tracker::{ABORTED, CONSUMED, CONSUMING, SEEN_AT};

/// Entries that are seen but not consuming, consumed or aborted, oldest
/// `seen_at` first, capped at the store's result ceiling.
pub fn pending_select(domain: &str) -> Select {
    Select::from_domain(domain)
        .is_null(CONSUMED)
        .is_null(CONSUMING)
        .is_null(ABORTED)
        .is_not_null(SEEN_AT)
        .order_by(SEEN_AT)
        .limit(MAX_SELECT_LIMIT)
}

/// Held by a worker right now. `consuming` stays set after consumption, so
/// a bare not-null check would also count consumed entries.
pub fn consuming_select(domain: &str) -> Select {
    Select::from_domain(domain)
        .is_not_null(CONSUMING)
        .is_null(CONSUMED)
}

pub fn consumed_select(domain: &str) -> Select {
    Select::from_domain(domain).is_not_null(CONSUMED)
}

pub fn aborted_select(domain: &str) -> Select {
    Select::from_domain(domain).is_not_null(ABORTED)
}

/// A single drained batch of pending entries.
///
/// Items are projected as they are pulled. Once exhausted, re-query the
/// tracker for the next batch.
#[derive(Debug)]
pub struct PendingEntries {
    items: std::vec::IntoIter<Item>,
}

impl PendingEntries {
    pub(crate) fn new(items: Vec<Item>) -> Self {
        Self {
            items: items.into_iter(),
        }
    }
}

impl Iterator for PendingEntries {
    type Item = TrackedEntry;

    fn next(&mut self) -> Option<TrackedEntry> {
        self.items.by_ref().find_map(|item| to_tracked_entry(&item))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.items.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Attribute, Predicate};

    #[test]
    fn test_pending_select_shape() {
        let select = pending_select("entries");
        assert_eq!(select.domain, "entries");
        assert_eq!(select.limit, MAX_SELECT_LIMIT);
        assert_eq!(select.order_by.as_deref(), Some(SEEN_AT));
        assert_eq!(
            select.predicates,
            vec![
                Predicate::IsNull(CONSUMED.into()),
                Predicate::IsNull(CONSUMING.into()),
                Predicate::IsNull(ABORTED.into()),
                Predicate::IsNotNull(SEEN_AT.into()),
            ]
        );
    }

    #[test]
    fn test_pending_entries_skip_unprojectable_items() {
        let seen = |name: &str| Item {
            name: name.into(),
            attributes: vec![Attribute {
                name: SEEN_AT.into(),
                value: "2024/01/01 00:00:00".into(),
            }],
        };
        let ids: Vec<String> = PendingEntries::new(vec![seen("a"), seen(""), seen("b")])
            .map(|e| e.id.to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
