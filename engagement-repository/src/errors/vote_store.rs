//! Error types for the vote store.
//! Defines the errors that can occur while reading or committing votes.
use thiserror::Error;

/// Represents errors that can occur within a vote store.
///
/// `Conflict` is the only recoverable variant: the item changed after the
/// snapshot the commit was built from, and the transaction should be rerun.
#[derive(Debug, Error)]
pub enum VoteStoreError {
    #[error("Write conflict on {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Invalid vote value: {0}")]
    InvalidVoteValue(i16),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

impl VoteStoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, VoteStoreError::Conflict(_))
    }
}
