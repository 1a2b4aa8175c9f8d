//! In-memory implementation of the vote store.
//!
//! Keeps items, their versions and their votes behind a single
//! `tokio::sync::RwLock`. Snapshot reads take the read lock, commits take the
//! write lock, so a commit's version check and its writes are one atomic step.
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use engagement_shared::types::{
    ItemAggregate, ItemKind, ItemRef, UserId, Vote, VoteCommit, VoteMutation, VoteSnapshot,
};
use tokio::sync::RwLock;
use tracing::debug;

use crate::{VoteStore, VoteStoreError};

#[derive(Debug, Clone)]
struct StoredItem {
    aggregate: ItemAggregate,
    version: i64,
}

#[derive(Debug, Default)]
struct State {
    items: HashMap<ItemRef, StoredItem>,
    votes: HashMap<ItemRef, BTreeMap<UserId, Vote>>,
}

impl State {
    fn items_of_kind<'a>(&'a self, kind: &'a ItemKind) -> impl Iterator<Item = &'a ItemAggregate> {
        self.items
            .values()
            .map(|stored| &stored.aggregate)
            .filter(move |aggregate| &aggregate.item.kind == kind)
    }
}

/// Vote store held entirely in process memory.
///
/// Used as the default backend when no database is configured and as the
/// store behind the engine's tests.
#[derive(Debug, Default)]
pub struct InMemoryVoteStore {
    state: RwLock<State>,
}

impl InMemoryVoteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Sorts aggregates by a descending key, breaking ties by item id.
fn rank_by<K: Ord>(mut aggregates: Vec<ItemAggregate>, key: impl Fn(&ItemAggregate) -> K) -> Vec<ItemAggregate> {
    aggregates.sort_by(|a, b| key(b).cmp(&key(a)).then_with(|| a.item.id.cmp(&b.item.id)));
    aggregates
}

#[async_trait]
impl VoteStore for InMemoryVoteStore {
    async fn create_item(&self, item: &ItemRef, at: DateTime<Utc>) -> Result<(), VoteStoreError> {
        let mut state = self.state.write().await;
        state.items.entry(item.clone()).or_insert_with(|| StoredItem {
            aggregate: ItemAggregate::empty(item.clone(), at),
            version: 0,
        });
        Ok(())
    }

    async fn read_snapshot(
        &self,
        item: &ItemRef,
        user_id: &UserId,
    ) -> Result<Option<VoteSnapshot>, VoteStoreError> {
        let state = self.state.read().await;
        let Some(stored) = state.items.get(item) else {
            return Ok(None);
        };

        let votes = state.votes.get(item);
        Ok(Some(VoteSnapshot {
            aggregate: stored.aggregate.clone(),
            version: stored.version,
            existing_vote: votes.and_then(|votes| votes.get(user_id)).cloned(),
            item_votes: votes
                .map(|votes| votes.values().cloned().collect())
                .unwrap_or_default(),
        }))
    }

    async fn commit_vote(&self, commit: &VoteCommit) -> Result<(), VoteStoreError> {
        let mut state = self.state.write().await;

        let current_version = state
            .items
            .get(&commit.item)
            .map(|stored| stored.version)
            .ok_or_else(|| VoteStoreError::InvalidRecord(format!("unknown item {}", commit.item)))?;

        if current_version != commit.expected_version {
            debug!(
                item = %commit.item,
                expected_version = commit.expected_version,
                current_version,
                "Rejecting stale vote commit"
            );
            return Err(VoteStoreError::Conflict(commit.item.to_string()));
        }

        let votes = state.votes.entry(commit.item.clone()).or_default();
        match &commit.mutation {
            VoteMutation::Insert(vote) => {
                if votes.contains_key(&vote.user_id) {
                    return Err(VoteStoreError::Conflict(commit.item.to_string()));
                }
                votes.insert(vote.user_id.clone(), vote.clone());
            }
            VoteMutation::Update(vote) => match votes.get_mut(&vote.user_id) {
                Some(existing) => *existing = vote.clone(),
                None => return Err(VoteStoreError::Conflict(commit.item.to_string())),
            },
            VoteMutation::Delete { user_id } => {
                if votes.remove(user_id).is_none() {
                    return Err(VoteStoreError::Conflict(commit.item.to_string()));
                }
            }
        }

        if let Some(stored) = state.items.get_mut(&commit.item) {
            stored.aggregate = commit.aggregate.clone();
            stored.version += 1;
        }
        Ok(())
    }

    async fn get_aggregate(&self, item: &ItemRef) -> Result<Option<ItemAggregate>, VoteStoreError> {
        let state = self.state.read().await;
        Ok(state.items.get(item).map(|stored| stored.aggregate.clone()))
    }

    async fn get_aggregates(
        &self,
        kind: &ItemKind,
        item_ids: &[String],
    ) -> Result<Vec<ItemAggregate>, VoteStoreError> {
        let state = self.state.read().await;
        Ok(item_ids
            .iter()
            .filter_map(|id| state.items.get(&ItemRef::new(kind.clone(), id.clone())))
            .map(|stored| stored.aggregate.clone())
            .collect())
    }

    async fn get_vote(&self, item: &ItemRef, user_id: &UserId) -> Result<Option<Vote>, VoteStoreError> {
        let state = self.state.read().await;
        Ok(state
            .votes
            .get(item)
            .and_then(|votes| votes.get(user_id))
            .cloned())
    }

    async fn get_user_votes(
        &self,
        user_id: &UserId,
        kind: &ItemKind,
        item_ids: &[String],
    ) -> Result<Vec<Vote>, VoteStoreError> {
        let state = self.state.read().await;
        Ok(item_ids
            .iter()
            .filter_map(|id| state.votes.get(&ItemRef::new(kind.clone(), id.clone())))
            .filter_map(|votes| votes.get(user_id))
            .cloned()
            .collect())
    }

    async fn list_item_votes(&self, item: &ItemRef) -> Result<Vec<Vote>, VoteStoreError> {
        let state = self.state.read().await;
        Ok(state
            .votes
            .get(item)
            .map(|votes| votes.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn list_items(&self, kind: &ItemKind) -> Result<Vec<ItemAggregate>, VoteStoreError> {
        let state = self.state.read().await;
        let mut items: Vec<ItemAggregate> = state.items_of_kind(kind).cloned().collect();
        items.sort_by(|a, b| a.item.id.cmp(&b.item.id));
        Ok(items)
    }

    async fn top_by_net_votes(
        &self,
        kind: &ItemKind,
        limit: usize,
    ) -> Result<Vec<ItemAggregate>, VoteStoreError> {
        let state = self.state.read().await;
        let candidates = state
            .items_of_kind(kind)
            .filter(|aggregate| aggregate.net_votes > 0)
            .cloned()
            .collect();
        let mut ranked = rank_by(candidates, |aggregate| aggregate.net_votes);
        ranked.truncate(limit);
        Ok(ranked)
    }

    async fn top_by_contested_score(
        &self,
        kind: &ItemKind,
        limit: usize,
        min_engagement: i64,
    ) -> Result<Vec<ItemAggregate>, VoteStoreError> {
        let state = self.state.read().await;
        let candidates = state
            .items_of_kind(kind)
            .filter(|aggregate| aggregate.total_engagement >= min_engagement)
            .cloned()
            .collect();
        let mut ranked = rank_by(candidates, |aggregate| aggregate.contested_score);
        ranked.truncate(limit);
        Ok(ranked)
    }

    async fn list_user_votes(&self, user_id: &UserId) -> Result<Vec<Vote>, VoteStoreError> {
        let state = self.state.read().await;
        let mut votes: Vec<Vote> = state
            .votes
            .values()
            .filter_map(|votes| votes.get(user_id))
            .cloned()
            .collect();
        votes.sort_by(|a, b| b.voted_at.cmp(&a.voted_at).then_with(|| a.item.cmp(&b.item)));
        Ok(votes)
    }
}
