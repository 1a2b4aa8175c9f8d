//! Debounced realtime delivery of item aggregates.
//!
//! Every subscription runs its own task on the engine's aggregate feed. Once
//! its item has been quiet for the debounce interval the task reads the
//! committed aggregate back from the store and delivers it, so a burst of
//! votes produces a single callback carrying the final state.
use std::sync::Arc;
use std::time::Duration;

use engagement_repository::VoteStore;
use engagement_shared::types::{ItemAggregate, ItemKindRegistry, ItemRef};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::engine::VoteEngine;
use crate::errors::VoteError;

/// Default quiet period before a change is delivered.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(2);

/// Creates debounced subscriptions to item aggregates.
pub struct AggregateNotifier {
    store: Arc<dyn VoteStore>,
    kinds: ItemKindRegistry,
    feed: broadcast::Sender<ItemAggregate>,
    debounce: Duration,
}

impl AggregateNotifier {
    /// Creates a notifier over the aggregates committed by `engine`.
    pub fn new(engine: &VoteEngine, debounce: Duration) -> Self {
        Self {
            store: engine.store().clone(),
            kinds: engine.kinds().clone(),
            feed: engine.feed().clone(),
            debounce,
        }
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Subscribes `callback` to changes of one item's aggregate.
    ///
    /// Must be called from within a tokio runtime. The callback runs on the
    /// subscription's task and should not block.
    ///
    /// # Errors
    ///
    /// * `InvalidItemType` - `item_type` is not a registered kind
    pub fn subscribe<F>(
        &self,
        item_type: &str,
        item_id: &str,
        callback: F,
    ) -> Result<Subscription, VoteError>
    where
        F: FnMut(ItemAggregate) + Send + 'static,
    {
        let kind = self
            .kinds
            .resolve(item_type)
            .ok_or_else(|| VoteError::InvalidItemType(item_type.to_string()))?;
        let item = ItemRef::new(kind, item_id);

        debug!(item = %item, "Subscribing to aggregate changes");
        let watcher = Watcher {
            item,
            feed: self.feed.subscribe(),
            store: self.store.clone(),
            debounce: self.debounce,
        };
        let handle = tokio::spawn(watcher.run(callback));

        Ok(Subscription {
            handle: Some(handle),
        })
    }
}

/// Handle of an active subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Stops deliveries, discarding any pending change. Calling it again does
    /// nothing.
    pub fn unsubscribe(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

struct Watcher {
    item: ItemRef,
    feed: broadcast::Receiver<ItemAggregate>,
    store: Arc<dyn VoteStore>,
    debounce: Duration,
}

impl Watcher {
    async fn run<F>(mut self, mut callback: F)
    where
        F: FnMut(ItemAggregate),
    {
        // Feed events only mark the item dirty. Publishes can reach the feed
        // out of commit order, so the delivered value is read back from the
        // store once the item is quiet.
        let mut dirty = false;
        let mut fallback: Option<ItemAggregate> = None;
        let deadline = sleep(self.debounce);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                received = self.feed.recv() => {
                    match received {
                        Ok(aggregate) if aggregate.item == self.item => {
                            fallback = Some(aggregate);
                        }
                        Ok(_) => continue,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(item = %self.item, skipped, "Aggregate feed lagged; item will be re-read");
                        }
                        Err(RecvError::Closed) => break,
                    }
                    dirty = true;
                    deadline.as_mut().reset(Instant::now() + self.debounce);
                }
                () = &mut deadline, if dirty => {
                    dirty = false;
                    if let Some(aggregate) = self.settle(fallback.take()).await {
                        callback(aggregate);
                    }
                }
            }
        }

        // The engine is gone; flush the last change on schedule.
        if dirty {
            deadline.await;
            if let Some(aggregate) = self.settle(fallback.take()).await {
                callback(aggregate);
            }
        }
    }

    /// Returns the committed aggregate, or the last one seen on the feed when
    /// the store cannot be read.
    async fn settle(&self, fallback: Option<ItemAggregate>) -> Option<ItemAggregate> {
        match self.store.get_aggregate(&self.item).await {
            Ok(Some(aggregate)) => Some(aggregate),
            Ok(None) => fallback,
            Err(err) => {
                warn!(item = %self.item, error = %err, "Failed to re-read aggregate");
                fallback
            }
        }
    }
}
