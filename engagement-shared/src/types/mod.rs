mod aggregate;
mod caller;
mod changeset;
mod item;
mod outcome;
mod user_vote;
mod vote_value;

pub use aggregate::{ItemAggregate, VoteCounts};
pub use caller::Caller;
pub use changeset::{VoteCommit, VoteMutation, VoteSnapshot};
pub use item::{DEFAULT_ITEM_KINDS, ItemKind, ItemKindRegistry, ItemRef, UserId};
pub use outcome::{ControversialItem, HistoryEntry, VoteOutcome};
pub use user_vote::Vote;
pub use vote_value::VoteValue;
