//! Test doubles shared by the engine's unit tests.
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use engagement_repository::{InMemoryVoteStore, VoteStore, VoteStoreError};
use engagement_shared::types::{
    ItemAggregate, ItemKind, ItemKindRegistry, ItemRef, UserId, Vote, VoteCommit, VoteMutation,
    VoteSnapshot,
};

use crate::clock::ManualClock;
use crate::engine::{EngineConfig, VoteEngine};

/// Wraps an `InMemoryVoteStore`, counting calls and injecting failures.
#[derive(Default)]
pub struct TestStore {
    pub inner: InMemoryVoteStore,
    pub calls: AtomicUsize,
    pub snapshot_reads: AtomicUsize,
    pub commits: AtomicUsize,
    /// Commits to reject with a conflict before delegating.
    pub conflicts_to_inject: AtomicUsize,
    /// Snapshot reads sleep for a minute while set.
    pub slow_reads: AtomicBool,
    /// Every call fails with a non-conflict error while set.
    pub broken: AtomicBool,
    /// Commits by this user are applied at once but acknowledged late.
    pub delayed_ack: Mutex<Option<(UserId, Duration)>>,
}

impl TestStore {
    fn enter(&self) -> Result<(), VoteStoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.broken.load(Ordering::SeqCst) {
            return Err(VoteStoreError::InvalidRecord("store is broken".to_string()));
        }
        Ok(())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn ack_delay(&self, commit: &VoteCommit) -> Option<Duration> {
        let user_id = match &commit.mutation {
            VoteMutation::Insert(vote) | VoteMutation::Update(vote) => &vote.user_id,
            VoteMutation::Delete { user_id } => user_id,
        };
        match &*self.delayed_ack.lock().unwrap() {
            Some((slow, delay)) if slow == user_id => Some(*delay),
            _ => None,
        }
    }
}

#[async_trait]
impl VoteStore for TestStore {
    async fn create_item(&self, item: &ItemRef, at: DateTime<Utc>) -> Result<(), VoteStoreError> {
        self.enter()?;
        self.inner.create_item(item, at).await
    }

    async fn read_snapshot(
        &self,
        item: &ItemRef,
        user_id: &UserId,
    ) -> Result<Option<VoteSnapshot>, VoteStoreError> {
        self.enter()?;
        self.snapshot_reads.fetch_add(1, Ordering::SeqCst);
        if self.slow_reads.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        self.inner.read_snapshot(item, user_id).await
    }

    async fn commit_vote(&self, commit: &VoteCommit) -> Result<(), VoteStoreError> {
        self.enter()?;
        self.commits.fetch_add(1, Ordering::SeqCst);
        let injected = self
            .conflicts_to_inject
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(VoteStoreError::Conflict(commit.item.to_string()));
        }
        self.inner.commit_vote(commit).await?;
        if let Some(delay) = self.ack_delay(commit) {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn get_aggregate(&self, item: &ItemRef) -> Result<Option<ItemAggregate>, VoteStoreError> {
        self.enter()?;
        self.inner.get_aggregate(item).await
    }

    async fn get_aggregates(
        &self,
        kind: &ItemKind,
        item_ids: &[String],
    ) -> Result<Vec<ItemAggregate>, VoteStoreError> {
        self.enter()?;
        self.inner.get_aggregates(kind, item_ids).await
    }

    async fn get_vote(&self, item: &ItemRef, user_id: &UserId) -> Result<Option<Vote>, VoteStoreError> {
        self.enter()?;
        self.inner.get_vote(item, user_id).await
    }

    async fn get_user_votes(
        &self,
        user_id: &UserId,
        kind: &ItemKind,
        item_ids: &[String],
    ) -> Result<Vec<Vote>, VoteStoreError> {
        self.enter()?;
        self.inner.get_user_votes(user_id, kind, item_ids).await
    }

    async fn list_item_votes(&self, item: &ItemRef) -> Result<Vec<Vote>, VoteStoreError> {
        self.enter()?;
        self.inner.list_item_votes(item).await
    }

    async fn list_items(&self, kind: &ItemKind) -> Result<Vec<ItemAggregate>, VoteStoreError> {
        self.enter()?;
        self.inner.list_items(kind).await
    }

    async fn top_by_net_votes(
        &self,
        kind: &ItemKind,
        limit: usize,
    ) -> Result<Vec<ItemAggregate>, VoteStoreError> {
        self.enter()?;
        self.inner.top_by_net_votes(kind, limit).await
    }

    async fn top_by_contested_score(
        &self,
        kind: &ItemKind,
        limit: usize,
        min_engagement: i64,
    ) -> Result<Vec<ItemAggregate>, VoteStoreError> {
        self.enter()?;
        self.inner
            .top_by_contested_score(kind, limit, min_engagement)
            .await
    }

    async fn list_user_votes(&self, user_id: &UserId) -> Result<Vec<Vote>, VoteStoreError> {
        self.enter()?;
        self.inner.list_user_votes(user_id).await
    }
}

pub fn asset(id: &str) -> ItemRef {
    ItemRef::new(ItemKind::new("asset"), id)
}

/// Fast retries so contention tests do not sleep long.
pub fn test_config() -> EngineConfig {
    EngineConfig {
        retry_base_delay: Duration::from_millis(1),
        retry_max_delay: Duration::from_millis(20),
        ..EngineConfig::default()
    }
}

pub fn engine_with(store: Arc<TestStore>, config: EngineConfig) -> VoteEngine {
    VoteEngine::new(
        store,
        Arc::new(ManualClock::default()),
        ItemKindRegistry::default(),
        config,
    )
}

/// Creates an engine over a fresh store holding the given asset ids.
pub async fn seeded_engine(ids: &[&str], config: EngineConfig) -> (Arc<TestStore>, VoteEngine) {
    let store = Arc::new(TestStore::default());
    for id in ids {
        store.inner.create_item(&asset(id), DateTime::UNIX_EPOCH).await.unwrap();
    }
    let engine = engine_with(store.clone(), config);
    (store, engine)
}
