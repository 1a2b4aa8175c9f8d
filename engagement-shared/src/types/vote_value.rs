use serde::{Deserialize, Serialize};

/// Represents the value of a vote cast by a user.
///
/// A retracted vote has no value: the vote record is deleted instead.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum VoteValue {
    /// Indicates an upvote or positive endorsement (+1).
    Up,
    /// Indicates a downvote or negative endorsement (-1).
    Down,
}

impl VoteValue {
    /// Parses a raw vote value, accepting only `1` and `-1`.
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            1 => Some(VoteValue::Up),
            -1 => Some(VoteValue::Down),
            _ => None,
        }
    }

    /// Returns the signed value of the vote.
    pub fn as_i64(self) -> i64 {
        match self {
            VoteValue::Up => 1,
            VoteValue::Down => -1,
        }
    }
}

impl From<VoteValue> for i64 {
    fn from(value: VoteValue) -> Self {
        value.as_i64()
    }
}
