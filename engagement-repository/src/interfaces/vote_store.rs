//! This module defines the `VoteStore` trait, the transactional interface the
//! voting engine depends on. It abstracts snapshot reads, version-checked
//! commits, and the read-only queries over votes and item aggregates.
use chrono::{DateTime, Utc};
use engagement_shared::types::{
    ItemAggregate, ItemKind, ItemRef, UserId, Vote, VoteCommit, VoteSnapshot,
};

use crate::errors::VoteStoreError;

/// A trait that defines the interface for interacting with the vote store.
///
/// Implementors provide a consistent snapshot read and a conditional commit.
/// The engine builds its read-then-write transactions and its retry loop on
/// top of these two operations.
#[async_trait::async_trait]
pub trait VoteStore: Send + Sync {
    /// Registers an item with an empty aggregate.
    ///
    /// Items are owned by the content layer; this is the hook it calls when a
    /// votable item is created. Registering an existing item is a no-op.
    async fn create_item(&self, item: &ItemRef, at: DateTime<Utc>) -> Result<(), VoteStoreError>;

    /// Reads, as one consistent snapshot, the item's aggregate and version,
    /// the user's existing vote, and every live vote on the item.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - The item does not exist
    /// * `Ok(Some(VoteSnapshot))` - The snapshot
    /// * `Err(VoteStoreError)` - The read failed
    async fn read_snapshot(
        &self,
        item: &ItemRef,
        user_id: &UserId,
    ) -> Result<Option<VoteSnapshot>, VoteStoreError>;

    /// Applies a vote mutation and replaces the item aggregate atomically.
    ///
    /// The commit only succeeds while the item is still at
    /// `commit.expected_version`, and it advances the version by one.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Both writes were persisted
    /// * `Err(VoteStoreError::Conflict)` - The item changed since the snapshot; nothing was written
    /// * `Err(VoteStoreError)` - Any other failure; nothing was written
    async fn commit_vote(&self, commit: &VoteCommit) -> Result<(), VoteStoreError>;

    /// Retrieves the cached aggregate of an item.
    async fn get_aggregate(&self, item: &ItemRef) -> Result<Option<ItemAggregate>, VoteStoreError>;

    /// Retrieves the cached aggregates of several items of one kind.
    ///
    /// Unknown ids are skipped; the result follows the order of `item_ids`.
    async fn get_aggregates(
        &self,
        kind: &ItemKind,
        item_ids: &[String],
    ) -> Result<Vec<ItemAggregate>, VoteStoreError>;

    /// Retrieves a user's vote on an item.
    async fn get_vote(&self, item: &ItemRef, user_id: &UserId) -> Result<Option<Vote>, VoteStoreError>;

    /// Retrieves a user's votes on several items of one kind.
    async fn get_user_votes(
        &self,
        user_id: &UserId,
        kind: &ItemKind,
        item_ids: &[String],
    ) -> Result<Vec<Vote>, VoteStoreError>;

    /// Retrieves every live vote on an item.
    async fn list_item_votes(&self, item: &ItemRef) -> Result<Vec<Vote>, VoteStoreError>;

    /// Retrieves the aggregates of every item of a kind, ordered by item id.
    async fn list_items(&self, kind: &ItemKind) -> Result<Vec<ItemAggregate>, VoteStoreError>;

    /// Retrieves the items of a kind with positive net votes, highest first.
    ///
    /// Ties are ordered by item id.
    async fn top_by_net_votes(
        &self,
        kind: &ItemKind,
        limit: usize,
    ) -> Result<Vec<ItemAggregate>, VoteStoreError>;

    /// Retrieves the items of a kind with at least `min_engagement` votes,
    /// highest contested score first.
    ///
    /// Ties are ordered by item id.
    async fn top_by_contested_score(
        &self,
        kind: &ItemKind,
        limit: usize,
        min_engagement: i64,
    ) -> Result<Vec<ItemAggregate>, VoteStoreError>;

    /// Retrieves every live vote of a user across all kinds, most recent first.
    async fn list_user_votes(&self, user_id: &UserId) -> Result<Vec<Vote>, VoteStoreError>;
}
