use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ItemRef, UserId, VoteValue};

/// Represents a user's live vote on an item.
///
/// At most one exists per (item kind, item id, user). A retracted vote is
/// deleted rather than stored with a neutral value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Vote {
    pub item: ItemRef,
    pub user_id: UserId,
    pub value: VoteValue,
    pub voted_at: DateTime<Utc>,
}
