//! This module defines the `VoteEngine`, which applies vote intents as atomic
//! state transitions against a `VoteStore` and keeps item aggregates
//! consistent under concurrent writers.
//!
//! Each vote runs as an optimistic transaction: read a snapshot of the item,
//! plan the transition, and commit it conditionally on the snapshot's version.
//! A commit rejected because another writer got there first is retried from
//! the snapshot read, with exponential backoff, up to a bounded number of
//! times.
//!
//! Every attempt reads the item's full vote set to recount it. This keeps the
//! counts authoritative but grows with the number of votes per item; it is the
//! known scaling boundary of this design.
mod transition;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use engagement_repository::{VoteStore, VoteStoreError};
use engagement_shared::types::{
    Caller, ItemAggregate, ItemKind, ItemKindRegistry, ItemRef, UserId, VoteCounts, VoteOutcome,
    VoteValue,
};
use tokio::sync::broadcast;
use tokio_retry::RetryIf;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, info, instrument, warn};

use crate::clock::Clock;
use crate::errors::VoteError;
use crate::rate_limiter::{DEFAULT_MAX_PER_WINDOW, DEFAULT_WINDOW, RateLimiter};
use transition::{PlannedVote, plan_vote};

/// Configuration for the vote engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Length of the rate limiter window.
    pub rate_limit_window: Duration,
    /// Vote calls accepted per rate limiter window.
    pub rate_limit_max: u64,
    /// Retries after the first attempt before a conflict is surfaced.
    pub max_retries: usize,
    /// Delay before the first retry; later retries double it.
    pub retry_base_delay: Duration,
    /// Upper bound of a single retry delay.
    pub retry_max_delay: Duration,
    /// Time budget of each store call within an attempt.
    pub attempt_timeout: Duration,
    /// Buffered aggregate changes per feed receiver.
    pub feed_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rate_limit_window: DEFAULT_WINDOW,
            rate_limit_max: DEFAULT_MAX_PER_WINDOW,
            max_retries: 5,
            retry_base_delay: Duration::from_millis(10),
            retry_max_delay: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(5),
            feed_capacity: 1024,
        }
    }
}

/// Why a single transaction attempt failed.
#[derive(Debug)]
enum AttemptError {
    /// Another writer committed first; the attempt can be rerun.
    Conflict,
    /// The snapshot read did not answer in time; the attempt can be rerun.
    TimedOut,
    /// Rerunning cannot help.
    Fatal(VoteError),
}

impl AttemptError {
    fn is_retryable(&self) -> bool {
        matches!(self, AttemptError::Conflict | AttemptError::TimedOut)
    }
}

impl From<VoteStoreError> for AttemptError {
    fn from(err: VoteStoreError) -> Self {
        if err.is_conflict() {
            AttemptError::Conflict
        } else {
            AttemptError::Fatal(err.into())
        }
    }
}

/// `VoteEngine` applies vote intents and serves the per-item vote reads.
///
/// It is built from explicit dependencies so that any number of isolated
/// engines can coexist, each with its own rate limiter and aggregate feed.
pub struct VoteEngine {
    store: Arc<dyn VoteStore>,
    clock: Arc<dyn Clock>,
    kinds: ItemKindRegistry,
    rate_limiter: RateLimiter,
    config: EngineConfig,
    feed: broadcast::Sender<ItemAggregate>,
}

impl VoteEngine {
    /// Creates a new `VoteEngine`.
    ///
    /// # Arguments
    ///
    /// * `store` - The vote store to transact against
    /// * `clock` - Source of vote timestamps and rate-limit time
    /// * `kinds` - The item kinds that may receive votes
    /// * `config` - Rate limit, retry and feed settings
    pub fn new(
        store: Arc<dyn VoteStore>,
        clock: Arc<dyn Clock>,
        kinds: ItemKindRegistry,
        config: EngineConfig,
    ) -> Self {
        let rate_limiter = RateLimiter::new(
            clock.clone(),
            config.rate_limit_window,
            config.rate_limit_max,
        );
        let (feed, _) = broadcast::channel(config.feed_capacity.max(1));

        Self {
            store,
            clock,
            kinds,
            rate_limiter,
            config,
            feed,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn kinds(&self) -> &ItemKindRegistry {
        &self.kinds
    }

    pub(crate) fn store(&self) -> &Arc<dyn VoteStore> {
        &self.store
    }

    pub(crate) fn feed(&self) -> &broadcast::Sender<ItemAggregate> {
        &self.feed
    }

    /// Subscribes to every aggregate committed by this engine, undebounced.
    pub fn aggregate_feed(&self) -> broadcast::Receiver<ItemAggregate> {
        self.feed.subscribe()
    }

    pub(crate) fn resolve_kind(&self, item_type: &str) -> Result<ItemKind, VoteError> {
        self.kinds
            .resolve(item_type)
            .ok_or_else(|| VoteError::InvalidItemType(item_type.to_string()))
    }

    pub(crate) fn resolve_item(&self, item_type: &str, item_id: &str) -> Result<ItemRef, VoteError> {
        Ok(ItemRef::new(self.resolve_kind(item_type)?, item_id))
    }

    /// Makes an item votable, starting from an empty aggregate.
    ///
    /// Called by the content layer when it creates an item. Registering an
    /// existing item leaves its votes untouched.
    pub async fn register_item(&self, item_type: &str, item_id: &str) -> Result<(), VoteError> {
        let item = self.resolve_item(item_type, item_id)?;
        self.store.create_item(&item, self.clock.now()).await?;
        debug!(item = %item, "Registered votable item");
        Ok(())
    }

    /// Applies a user's vote intent to an item.
    ///
    /// Casting a first vote records it, casting the value already held
    /// retracts it, and casting the opposite value flips it. The vote record
    /// and the recomputed aggregate are committed together.
    ///
    /// # Errors
    ///
    /// * `AuthenticationRequired` - The caller is anonymous
    /// * `InvalidVoteValue` - `value` is not `1` or `-1`
    /// * `InvalidItemType` - `item_type` is not a registered kind
    /// * `RateLimitExceeded` - The process-local limit tripped
    /// * `ItemNotFound` - The item does not exist
    /// * `TransactionConflict` - Contention outlasted the retry budget
    /// * `StoreUnavailable` - The store failed or timed out
    #[instrument(skip_all, fields(item_type = %item_type, item_id = %item_id, value = value))]
    pub async fn apply_vote(
        &self,
        caller: &Caller,
        item_type: &str,
        item_id: &str,
        value: i64,
    ) -> Result<VoteOutcome, VoteError> {
        let user_id = caller.user_id().ok_or(VoteError::AuthenticationRequired)?;
        let value = VoteValue::from_i64(value).ok_or(VoteError::InvalidVoteValue(value))?;
        let item = self.resolve_item(item_type, item_id)?;
        if !self.rate_limiter.allow() {
            return Err(VoteError::RateLimitExceeded);
        }

        let attempts = AtomicUsize::new(0);
        let (item_ref, attempts_ref) = (&item, &attempts);
        let result = RetryIf::spawn(
            self.retry_strategy(),
            move || {
                attempts_ref.fetch_add(1, Ordering::Relaxed);
                self.attempt_vote(item_ref, user_id, value)
            },
            |err: &AttemptError| {
                if err.is_retryable() {
                    debug!(item = %item_ref, error = ?err, "Vote attempt failed; retrying");
                }
                err.is_retryable()
            },
        )
        .await;

        let attempts = attempts.load(Ordering::Relaxed);
        match result {
            Ok(planned) => {
                info!(
                    item = %item,
                    user_id = %user_id,
                    vote_delta = planned.outcome.vote_delta,
                    net_votes = planned.outcome.net_votes,
                    attempts,
                    "Vote applied"
                );
                // No subscriber is not an error.
                let _ = self.feed.send(planned.commit.aggregate);
                Ok(planned.outcome)
            }
            Err(AttemptError::Conflict) => {
                warn!(item = %item, attempts, "Vote transaction gave up after repeated conflicts");
                Err(VoteError::TransactionConflict { attempts })
            }
            Err(AttemptError::TimedOut) => {
                warn!(item = %item, attempts, "Vote transaction gave up after repeated timeouts");
                Err(VoteError::StoreUnavailable(format!(
                    "snapshot read timed out after {attempts} attempts"
                )))
            }
            Err(AttemptError::Fatal(err)) => {
                warn!(item = %item, error = %err, "Vote transaction failed");
                Err(err)
            }
        }
    }

    /// Backoff delays between attempts: 2x, 4x, 8x ... the base delay,
    /// capped, jittered, and limited to `max_retries` entries.
    fn retry_strategy(&self) -> impl Iterator<Item = Duration> + use<> {
        let base_ms = u64::try_from(self.config.retry_base_delay.as_millis()).unwrap_or(u64::MAX);
        ExponentialBackoff::from_millis(2)
            .factor(base_ms.max(1))
            .max_delay(self.config.retry_max_delay)
            .map(jitter)
            .take(self.config.max_retries)
    }

    /// Runs one snapshot-plan-commit attempt.
    ///
    /// A timed-out snapshot read is safe to rerun. A timed-out commit is not,
    /// since it may have been applied, so it is reported as fatal.
    async fn attempt_vote(
        &self,
        item: &ItemRef,
        user_id: &UserId,
        value: VoteValue,
    ) -> Result<PlannedVote, AttemptError> {
        let timeout = self.config.attempt_timeout;

        let snapshot = tokio::time::timeout(timeout, self.store.read_snapshot(item, user_id))
            .await
            .map_err(|_| AttemptError::TimedOut)??
            .ok_or_else(|| {
                AttemptError::Fatal(VoteError::ItemNotFound {
                    item_type: item.kind.to_string(),
                    item_id: item.id.clone(),
                })
            })?;

        let planned = plan_vote(&snapshot, user_id, value, self.clock.now());

        tokio::time::timeout(timeout, self.store.commit_vote(&planned.commit))
            .await
            .map_err(|_| {
                AttemptError::Fatal(VoteError::StoreUnavailable(
                    "vote commit timed out; outcome unknown".to_string(),
                ))
            })??;

        Ok(planned)
    }

    /// Returns the caller's current vote on an item, `0` if none.
    ///
    /// Anonymous callers always get `0` without touching the store.
    pub async fn get_user_vote(
        &self,
        caller: &Caller,
        item_type: &str,
        item_id: &str,
    ) -> Result<i64, VoteError> {
        let Some(user_id) = caller.user_id() else {
            return Ok(0);
        };
        let item = self.resolve_item(item_type, item_id)?;
        let vote = self.store.get_vote(&item, user_id).await?;
        Ok(vote.map(|vote| vote.value.as_i64()).unwrap_or(0))
    }

    /// Returns the caller's votes on several items of one kind, keyed by item
    /// id, with `0` for items the caller has not voted on.
    pub async fn get_user_votes(
        &self,
        caller: &Caller,
        item_type: &str,
        item_ids: &[String],
    ) -> Result<HashMap<String, i64>, VoteError> {
        let mut votes: HashMap<String, i64> = item_ids.iter().map(|id| (id.clone(), 0)).collect();
        let Some(user_id) = caller.user_id() else {
            return Ok(votes);
        };

        let kind = self.resolve_kind(item_type)?;
        for vote in self.store.get_user_votes(user_id, &kind, item_ids).await? {
            votes.insert(vote.item.id, vote.value.as_i64());
        }
        Ok(votes)
    }

    /// Counts an item's live votes.
    ///
    /// Counts come from the vote records, not the cached aggregate.
    pub async fn get_vote_counts(&self, item_type: &str, item_id: &str) -> Result<VoteCounts, VoteError> {
        let item = self.resolve_item(item_type, item_id)?;
        let votes = self.store.list_item_votes(&item).await?;
        Ok(VoteCounts::tally(&votes))
    }

    /// Returns the cached net votes of an item.
    pub async fn get_total_votes(&self, item_type: &str, item_id: &str) -> Result<i64, VoteError> {
        let item = self.resolve_item(item_type, item_id)?;
        self.store
            .get_aggregate(&item)
            .await?
            .map(|aggregate| aggregate.net_votes)
            .ok_or_else(|| VoteError::ItemNotFound {
                item_type: item_type.to_string(),
                item_id: item_id.to_string(),
            })
    }

    /// Returns the cached aggregates of several items of one kind.
    pub async fn get_aggregates(
        &self,
        item_type: &str,
        item_ids: &[String],
    ) -> Result<Vec<ItemAggregate>, VoteError> {
        let kind = self.resolve_kind(item_type)?;
        Ok(self.store.get_aggregates(&kind, item_ids).await?)
    }
}

#[cfg(test)]
mod tests;
