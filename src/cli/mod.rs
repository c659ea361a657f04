pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "feedtrack")]
#[command(about = "Track consumption of feed entries across workers", long_about = None)]
pub struct Cli {
    /// SQLite database file (overrides the config file)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Domain holding the entry records (overrides the config file)
    #[arg(long, global = true)]
    pub domain: Option<String>,

    /// Number of parallel consumer workers (overrides the config file)
    #[arg(short, long, global = true)]
    pub workers: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start tracking an entry
    Track {
        /// Entry id
        id: String,
        /// When the entry was first seen, as "yyyy/MM/dd HH:mm:ss" (default: now)
        #[arg(long)]
        seen_at: Option<String>,
    },
    /// Claim an entry for consumption
    Claim {
        /// Entry id
        id: String,
    },
    /// Mark a claimed entry as consumed
    Consumed {
        /// Entry id
        id: String,
    },
    /// Release a claimed entry after a failed attempt
    Fail {
        /// Entry id
        id: String,
        /// Abandon the entry instead of scheduling a retry
        #[arg(long)]
        abort: bool,
    },
    /// Show the state of an entry
    Status {
        /// Entry id
        id: String,
    },
    /// List entries waiting to be consumed, oldest first
    Pending,
    /// Show consuming/consumed/aborted counts
    Stats,
    /// Check that the store is reachable
    Check,
    /// Consume one batch of pending entries by running a command per entry
    Consume {
        /// Retries before a failing entry is aborted (overrides the config file)
        #[arg(long)]
        max_retries: Option<u32>,
        /// Program and arguments; the entry id is appended
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        command: Vec<String>,
    },
}
