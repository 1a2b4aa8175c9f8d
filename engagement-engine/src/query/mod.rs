//! Read-only ranking queries over item aggregates.
use std::sync::Arc;

use engagement_repository::VoteStore;
use engagement_shared::types::{
    ControversialItem, ItemAggregate, ItemKind, ItemKindRegistry, VoteCounts,
};
use tracing::{debug, instrument};

use crate::errors::VoteError;

/// Serves the "most upvoted", "most controversial" and "most contested"
/// rankings for one kind of item.
pub struct VoteQueries {
    store: Arc<dyn VoteStore>,
    kinds: ItemKindRegistry,
}

impl VoteQueries {
    pub fn new(store: Arc<dyn VoteStore>, kinds: ItemKindRegistry) -> Self {
        Self { store, kinds }
    }

    fn resolve_kind(&self, item_type: &str) -> Result<ItemKind, VoteError> {
        self.kinds
            .resolve(item_type)
            .ok_or_else(|| VoteError::InvalidItemType(item_type.to_string()))
    }

    /// Items with positive net votes, highest first, ties by item id.
    pub async fn most_upvoted(
        &self,
        item_type: &str,
        limit: usize,
    ) -> Result<Vec<ItemAggregate>, VoteError> {
        let kind = self.resolve_kind(item_type)?;
        if limit == 0 {
            return Ok(Vec::new());
        }
        Ok(self.store.top_by_net_votes(&kind, limit).await?)
    }

    /// Items ranked by how evenly split their votes are, `min(up, down)`
    /// descending. Items without votes on both sides are left out.
    ///
    /// Unlike the other rankings this recounts every item's vote records on
    /// each call, costing one read per item of the kind plus all of their
    /// votes. Items tied on controversy keep item id order.
    #[instrument(skip(self))]
    pub async fn most_controversial(
        &self,
        item_type: &str,
        limit: usize,
    ) -> Result<Vec<ControversialItem>, VoteError> {
        let kind = self.resolve_kind(item_type)?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let items = self.store.list_items(&kind).await?;
        let scanned = items.len();
        let mut ranked = Vec::new();
        for aggregate in items {
            let votes = self.store.list_item_votes(&aggregate.item).await?;
            let counts = VoteCounts::tally(&votes);
            let controversy = counts.controversy();
            if controversy > 0 {
                ranked.push(ControversialItem {
                    item: aggregate.item,
                    upvotes: counts.upvotes,
                    downvotes: counts.downvotes,
                    controversy,
                });
            }
        }

        ranked.sort_by(|a, b| b.controversy.cmp(&a.controversy));
        ranked.truncate(limit);
        debug!(scanned, returned = ranked.len(), "Ranked controversial items");
        Ok(ranked)
    }

    /// Items with at least `min_engagement` votes, highest contested score
    /// first, ties by item id.
    pub async fn most_contested(
        &self,
        item_type: &str,
        limit: usize,
        min_engagement: i64,
    ) -> Result<Vec<ItemAggregate>, VoteError> {
        let kind = self.resolve_kind(item_type)?;
        if limit == 0 {
            return Ok(Vec::new());
        }
        Ok(self
            .store
            .top_by_contested_score(&kind, limit, min_engagement)
            .await?)
    }
}
