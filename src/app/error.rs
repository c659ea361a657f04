use thiserror::Error;

use crate::domain::EntryId;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Conditional check failed on attribute {attribute} of item {item}")]
    ConditionalCheckFailed { item: String, attribute: String },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Domain not found: {0}")]
    DomainNotFound(String),

    #[error("Entry is already being consumed: {0}")]
    AlreadyConsuming(EntryId),

    #[error("Store is unreachable: {0}")]
    Connectivity(#[source] Box<TrackerError>),

    #[error("Entry id must not be empty")]
    InvalidEntryId,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl TrackerError {
    /// True for the store's "condition not met" signal.
    pub fn is_conditional_check_failed(&self) -> bool {
        matches!(self, TrackerError::ConditionalCheckFailed { .. })
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
