//! # feedtrack
//!
//! Tracks the consumption lifecycle of entries pulled from an external feed,
//! so that several consumer processes can share one backlog without a lock
//! manager.
//!
//! ## Architecture
//!
//! ```text
//! feed poller → track → [Seen] → mark_as_consuming → [Consuming]
//!                                   ├─ mark_as_consumed → [Consumed]
//!                                   └─ fail ─┬─ retry → [Seen]
//!                                            └─ abort → [Aborted]
//! ```
//!
//! Each entry is one item in an attribute store; its state is the set of
//! attributes present on it. Claiming an entry is a conditional put on the
//! `consuming` attribute, so at most one worker holds an entry at a time.
//!
//! ## Quick Start
//!
//! ```bash
//! feedtrack track urn:entry:42
//! feedtrack pending
//! feedtrack consume -- ./process-entry.sh
//! feedtrack stats
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together the store,
/// tracker and configuration.
pub mod app;

/// Command-line interface using clap.
pub mod cli;

/// Configuration loaded from `~/.config/feedtrack/config.toml`.
pub mod config;

/// Consumer passes over pending entries.
///
/// - [`ConsumeAction`](consumer::ConsumeAction): async trait for the work done per entry
/// - [`ParallelConsumer`](consumer::ParallelConsumer): bounded concurrent pass with retry accounting
/// - [`CommandAction`](consumer::CommandAction): runs an external program per entry
pub mod consumer;

/// Core domain models.
///
/// - [`EntryId`](domain::EntryId), [`SeenEntry`](domain::SeenEntry),
///   [`TrackedEntry`](domain::TrackedEntry), [`EntryState`](domain::EntryState)
/// - [`Clock`](domain::Clock): replaceable time source
pub mod domain;

/// Attribute store contract and its SQLite implementation.
///
/// - [`AttributeStore`](store::AttributeStore): conditional puts, deletes, selects, counts
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation
pub mod store;

/// The entry state machine.
///
/// - [`FeedTracker`](tracker::FeedTracker): lifecycle operations
/// - [`AttributeTracker`](tracker::AttributeTracker): implementation over an attribute store
pub mod tracker;
