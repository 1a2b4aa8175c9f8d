//! # Engagement Repository
//! This crate provides the `VoteStore` trait the voting engine persists
//! through, together with an in-memory implementation and a PostgreSQL
//! implementation. Both offer consistent snapshot reads and version-checked
//! commits so that concurrent vote transactions never lose an update.
pub mod errors;
pub mod interfaces;
pub mod memory;
pub mod postgres;

pub use errors::VoteStoreError;
pub use interfaces::VoteStore;
pub use memory::InMemoryVoteStore;
pub use postgres::PostgresVoteStore;
