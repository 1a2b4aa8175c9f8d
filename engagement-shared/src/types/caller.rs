use serde::{Deserialize, Serialize};

use crate::types::UserId;

/// The identity behind a request, as established by the auth layer.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Caller {
    /// No session; read-only operations only.
    Anonymous,
    /// An identified user.
    User(UserId),
}

impl Caller {
    pub fn user(id: impl Into<String>) -> Self {
        Caller::User(UserId::new(id))
    }

    /// Returns the caller's user id, if identified.
    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            Caller::Anonymous => None,
            Caller::User(id) => Some(id),
        }
    }
}
