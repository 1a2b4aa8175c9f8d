use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ItemAggregate, ItemRef, VoteValue};

/// The result of applying one vote intent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteOutcome {
    pub net_votes: i64,
    pub upvote_count: i64,
    pub downvote_count: i64,
    pub contested_score: i64,
    /// Change this call made to the item's net votes: ±1 or ±2.
    pub vote_delta: i64,
    /// The caller's vote after the call, `0` when it was retracted.
    pub resulting_user_vote: i64,
}

impl VoteOutcome {
    pub fn new(aggregate: &ItemAggregate, vote_delta: i64, resulting_user_vote: i64) -> Self {
        Self {
            net_votes: aggregate.net_votes,
            upvote_count: aggregate.upvote_count,
            downvote_count: aggregate.downvote_count,
            contested_score: aggregate.contested_score,
            vote_delta,
            resulting_user_vote,
        }
    }
}

/// An item ranked by how evenly its votes are split.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ControversialItem {
    pub item: ItemRef,
    pub upvotes: i64,
    pub downvotes: i64,
    pub controversy: i64,
}

/// One entry of a user's voting history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntry {
    pub item: ItemRef,
    pub value: VoteValue,
    pub voted_at: DateTime<Utc>,
}
