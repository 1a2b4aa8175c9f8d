use crate::types::{ItemAggregate, ItemRef, UserId, Vote};

/// A consistent read of everything a vote transaction depends on.
///
/// `version` identifies the state of the item the snapshot was taken from; a
/// [`VoteCommit`] built from this snapshot is only applied while the item is
/// still at that version.
#[derive(Debug, Clone, PartialEq)]
pub struct VoteSnapshot {
    pub aggregate: ItemAggregate,
    pub version: i64,
    pub existing_vote: Option<Vote>,
    pub item_votes: Vec<Vote>,
}

/// The change applied to the caller's own vote record.
#[derive(Debug, Clone, PartialEq)]
pub enum VoteMutation {
    /// First vote by this user on the item.
    Insert(Vote),
    /// The user flipped their vote.
    Update(Vote),
    /// The user cast the value they already held, retracting it.
    Delete { user_id: UserId },
}

/// Represents the changes persisted atomically by one vote transaction.
///
/// The vote mutation and the recomputed aggregate are written together, or
/// not at all when the item moved past `expected_version`.
#[derive(Debug, Clone, PartialEq)]
pub struct VoteCommit {
    pub item: ItemRef,
    pub expected_version: i64,
    pub mutation: VoteMutation,
    pub aggregate: ItemAggregate,
}
