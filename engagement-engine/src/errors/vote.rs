//! Error types for the voting engine.
//! Defines every failure a caller of the engine, the queries, the notifier or
//! the history reader can observe.
use engagement_repository::VoteStoreError;
use thiserror::Error;

/// Represents errors returned by the voting core.
///
/// Input and rate-limit errors are detected before any store I/O. Write
/// conflicts are retried internally and only surface as
/// `TransactionConflict` once the retry budget is spent.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VoteError {
    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Invalid item type: {0}")]
    InvalidItemType(String),

    #[error("Invalid vote value: {0} (expected 1 or -1)")]
    InvalidVoteValue(i64),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Item not found: {item_type}/{item_id}")]
    ItemNotFound { item_type: String, item_id: String },

    #[error("Transaction conflict after {attempts} attempts")]
    TransactionConflict { attempts: usize },

    #[error("Vote store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<VoteStoreError> for VoteError {
    fn from(err: VoteStoreError) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}
