//! The state transition applied by one vote intent.
//!
//! Given a consistent snapshot of an item, computes the caller's vote
//! mutation, the vote delta, and the aggregate recounted from the snapshot's
//! live vote records.
use chrono::{DateTime, Utc};
use engagement_shared::types::{
    ItemAggregate, UserId, Vote, VoteCommit, VoteCounts, VoteMutation, VoteOutcome, VoteSnapshot,
    VoteValue,
};

/// The commit to attempt and the outcome to report if it succeeds.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PlannedVote {
    pub commit: VoteCommit,
    pub outcome: VoteOutcome,
}

/// Plans the transition of `user_id`'s vote on the snapshot's item.
///
/// | existing vote | new vote | mutation | delta        | resulting vote |
/// |---------------|----------|----------|--------------|----------------|
/// | none          | v        | insert   | v            | v              |
/// | v             | v        | delete   | -v           | 0              |
/// | w             | v        | update   | v - w (±2)   | v              |
pub(crate) fn plan_vote(
    snapshot: &VoteSnapshot,
    user_id: &UserId,
    value: VoteValue,
    now: DateTime<Utc>,
) -> PlannedVote {
    let item = snapshot.aggregate.item.clone();
    let new_vote = Vote {
        item: item.clone(),
        user_id: user_id.clone(),
        value,
        voted_at: now,
    };

    let (mutation, vote_delta, resulting) = match &snapshot.existing_vote {
        None => (VoteMutation::Insert(new_vote), value.as_i64(), Some(value)),
        Some(existing) if existing.value == value => (
            VoteMutation::Delete {
                user_id: user_id.clone(),
            },
            -value.as_i64(),
            None,
        ),
        Some(existing) => (
            VoteMutation::Update(new_vote),
            value.as_i64() - existing.value.as_i64(),
            Some(value),
        ),
    };

    // Recount from the snapshot's records rather than adjusting cached counters.
    let others = VoteCounts::tally(
        snapshot
            .item_votes
            .iter()
            .filter(|vote| &vote.user_id != user_id),
    );
    let (upvotes, downvotes) = match resulting {
        Some(VoteValue::Up) => (others.upvotes + 1, others.downvotes),
        Some(VoteValue::Down) => (others.upvotes, others.downvotes + 1),
        None => (others.upvotes, others.downvotes),
    };

    let aggregate = ItemAggregate::from_counts(item.clone(), upvotes, downvotes, now);
    let outcome = VoteOutcome::new(
        &aggregate,
        vote_delta,
        resulting.map(VoteValue::as_i64).unwrap_or(0),
    );

    PlannedVote {
        commit: VoteCommit {
            item,
            expected_version: snapshot.version,
            mutation,
            aggregate,
        },
        outcome,
    }
}
