//! Error types for the Engagement application.
//! Consolidates the errors raised while configuring and wiring the voting
//! engine with the errors of the engine and store themselves.
use engagement_engine::VoteError;
use engagement_repository::VoteStoreError;

#[derive(Debug, thiserror::Error)]
pub enum EngagementError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("Vote store error: {0}")]
    Store(#[from] VoteStoreError),
    #[error("Vote error: {0}")]
    Vote(#[from] VoteError),
}

impl EngagementError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
