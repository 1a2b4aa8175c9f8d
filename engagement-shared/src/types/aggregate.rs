use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scoring::contested_score;
use crate::types::{ItemRef, Vote, VoteValue};

/// Represents the cached vote summary of one item.
///
/// Every derived field is computed by [`ItemAggregate::from_counts`], so
/// `net_votes`, `total_engagement` and `contested_score` can never drift from
/// the upvote and downvote counts they were built from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemAggregate {
    pub item: ItemRef,
    pub upvote_count: i64,
    pub downvote_count: i64,
    pub net_votes: i64,
    pub contested_score: i64,
    pub total_engagement: i64,
    pub updated_at: DateTime<Utc>,
}

impl ItemAggregate {
    /// Builds an aggregate from upvote and downvote counts.
    pub fn from_counts(
        item: ItemRef,
        upvote_count: i64,
        downvote_count: i64,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            item,
            upvote_count,
            downvote_count,
            net_votes: upvote_count - downvote_count,
            contested_score: contested_score(upvote_count, downvote_count),
            total_engagement: upvote_count + downvote_count,
            updated_at,
        }
    }

    /// An aggregate for an item nobody has voted on yet.
    pub fn empty(item: ItemRef, updated_at: DateTime<Utc>) -> Self {
        Self::from_counts(item, 0, 0, updated_at)
    }
}

/// Upvote and downvote totals counted from live vote records.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteCounts {
    pub upvotes: i64,
    pub downvotes: i64,
    pub net: i64,
}

impl VoteCounts {
    pub fn new(upvotes: i64, downvotes: i64) -> Self {
        Self {
            upvotes,
            downvotes,
            net: upvotes - downvotes,
        }
    }

    /// Tallies a set of votes.
    pub fn tally<'a, I>(votes: I) -> Self
    where
        I: IntoIterator<Item = &'a Vote>,
    {
        let (upvotes, downvotes) = votes
            .into_iter()
            .fold((0, 0), |(up, down), vote| match vote.value {
                VoteValue::Up => (up + 1, down),
                VoteValue::Down => (up, down + 1),
            });
        Self::new(upvotes, downvotes)
    }

    /// Returns the smaller of the two sides, the controversy of an item.
    pub fn controversy(&self) -> i64 {
        self.upvotes.min(self.downvotes)
    }
}
