//! # Engagement Shared
//! This crate defines the data structures shared across the engagement voting
//! ecosystem: item identities, individual votes, cached item aggregates, the
//! changeset types exchanged with the vote store, and the contested-score metric.
pub mod scoring;
pub mod types;

pub use scoring::contested_score;
