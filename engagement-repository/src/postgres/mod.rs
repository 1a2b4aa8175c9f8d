//! PostgreSQL implementation of the vote store.
//!
//! ## Database Tables
//!
//! - `vote_items`: cached aggregate and version per item
//! - `user_votes`: one live vote per item and user
mod vote_store;

pub use vote_store::PostgresVoteStore;

/// Embedded schema migrations for the vote tables.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("src/postgres/migrations");
