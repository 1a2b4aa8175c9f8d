//! Per-user voting history.
use std::sync::Arc;

use engagement_repository::VoteStore;
use engagement_shared::types::{Caller, HistoryEntry, UserId};

use crate::errors::VoteError;

/// Reads the live votes a user has cast, across every item kind.
pub struct VoteHistory {
    store: Arc<dyn VoteStore>,
}

impl VoteHistory {
    pub fn new(store: Arc<dyn VoteStore>) -> Self {
        Self { store }
    }

    /// Lists a user's live votes, most recent first.
    ///
    /// Without an explicit `user_id` the caller's own history is read, which
    /// requires an identified caller. Retracted votes do not appear.
    pub async fn user_voting_history(
        &self,
        caller: &Caller,
        user_id: Option<&str>,
    ) -> Result<Vec<HistoryEntry>, VoteError> {
        let user_id = match user_id {
            Some(id) => UserId::new(id),
            None => caller
                .user_id()
                .cloned()
                .ok_or(VoteError::AuthenticationRequired)?,
        };

        let votes = self.store.list_user_votes(&user_id).await?;
        Ok(votes
            .into_iter()
            .map(|vote| HistoryEntry {
                item: vote.item,
                value: vote.value,
                voted_at: vote.voted_at,
            })
            .collect())
    }
}
