use std::sync::Arc;

use chrono::Utc;

use crate::app::{AppContext, Result, TrackerError};
use crate::consumer::{CommandAction, ParallelConsumer, RetryPolicy};
use crate::domain::{EntryId, EntryState, SeenEntry};
use crate::store::AttributeStore;
use crate::tracker::projection::{format_timestamp, parse_timestamp};
use crate::tracker::{Claim, FeedTracker};

pub fn track(ctx: &AppContext, id: &str, seen_at: Option<&str>) -> Result<()> {
    let id = EntryId::new(id)?;
    let seen_at = match seen_at {
        Some(s) => parse_timestamp(s)
            .ok_or_else(|| TrackerError::Other(format!("Invalid timestamp: {}", s)))?,
        None => Utc::now(),
    };

    ctx.tracker.track(&SeenEntry::new(id.clone(), seen_at))?;
    println!("Tracking {} (seen {})", id, format_timestamp(seen_at));
    Ok(())
}

pub fn claim(ctx: &AppContext, id: &str) -> Result<()> {
    let id = EntryId::new(id)?;

    match ctx.tracker.mark_as_consuming(&id)? {
        Claim::Acquired => println!("Claimed {}", id),
        Claim::AlreadyConsuming => {
            return Err(TrackerError::AlreadyConsuming(id));
        }
    }

    Ok(())
}

pub fn consumed(ctx: &AppContext, id: &str) -> Result<()> {
    let id = EntryId::new(id)?;
    ctx.tracker.mark_as_consumed(&id)?;
    println!("Consumed {}", id);
    Ok(())
}

pub fn fail(ctx: &AppContext, id: &str, abort: bool) -> Result<()> {
    let id = EntryId::new(id)?;
    let entry = ctx
        .tracker
        .tracked_entry(&id)?
        .ok_or_else(|| TrackerError::Other(format!("Entry not tracked: {}", id)))?;

    ctx.tracker.fail(&entry, !abort)?;

    if abort {
        println!("Aborted {}", id);
    } else {
        println!("Released {} for retry {}", id, entry.retries.saturating_add(1));
    }
    Ok(())
}

pub fn status(ctx: &AppContext, id: &str) -> Result<()> {
    let id = EntryId::new(id)?;
    let state = ctx.tracker.entry_state(&id)?;
    println!("{}: {}", id, state);

    if state != EntryState::Unseen {
        if let Some(entry) = ctx.tracker.tracked_entry(&id)? {
            let show = |t: Option<chrono::DateTime<Utc>>| {
                t.map(format_timestamp).unwrap_or_else(|| "-".into())
            };
            println!("  created: {}", show(entry.created));
            println!("  seen at: {}", show(entry.seen_at));
            println!("  retries: {}", entry.retries);
        }
    }

    Ok(())
}

pub fn list_pending(ctx: &AppContext) -> Result<()> {
    let mut count = 0;

    for entry in ctx.tracker.entries_to_be_consumed()? {
        let seen = entry
            .seen_at
            .map(format_timestamp)
            .unwrap_or_else(|| "-".into());
        println!("{}  {}  (retries: {})", seen, entry.id, entry.retries);
        count += 1;
    }

    if count == 0 {
        println!("No pending entries");
    }

    Ok(())
}

pub fn stats(ctx: &AppContext) -> Result<()> {
    let metadata = ctx.store.domain_metadata(ctx.tracker.domain())?;
    println!("Domain:    {}", ctx.tracker.domain());
    println!("Tracked:   {}", metadata.item_count);
    println!("Consuming: {}", ctx.tracker.count_consuming()?);
    println!("Consumed:  {}", ctx.tracker.count_consumed()?);
    println!("Aborted:   {}", ctx.tracker.count_aborted()?);
    Ok(())
}

pub fn check(ctx: &AppContext) -> Result<()> {
    ctx.tracker.check_connectivity()?;
    println!("Store reachable");
    Ok(())
}

pub async fn consume(
    ctx: &AppContext,
    workers: usize,
    max_retries: u32,
    command: &[String],
) -> Result<()> {
    let action = Arc::new(CommandAction::from_argv(command)?);
    let consumer = ParallelConsumer::with_workers(action, workers, RetryPolicy::new(max_retries));

    let report = consumer.consume_pending(ctx.tracker.clone()).await?;

    for (id, e) in &report.errors {
        eprintln!("  Error consuming {}: {}", id, e);
    }
    println!(
        "Consume complete: {} consumed, {} retried, {} aborted, {} skipped, {} errors",
        report.consumed,
        report.retried,
        report.aborted,
        report.skipped,
        report.errors.len()
    );

    Ok(())
}
