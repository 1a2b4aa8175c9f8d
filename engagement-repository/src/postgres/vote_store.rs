//! PostgreSQL implementation of the vote store.
//!
//! Provides a PostgreSQL backend for the `VoteStore` trait with connection
//! pooling, snapshot reads and version-checked commits.
//!
//! ## Key Features
//!
//! - Connection pooling with `sqlx::PgPool`
//! - Snapshot reads in a `REPEATABLE READ` read-only transaction
//! - Commits guarded by the item's `version` column
//! - Unique violations and serialization failures reported as conflicts
//! - Index-backed ranking reads over the cached aggregates
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use engagement_shared::types::{
    ItemAggregate, ItemKind, ItemRef, UserId, Vote, VoteCommit, VoteMutation, VoteSnapshot,
    VoteValue,
};
use tracing::debug;

use crate::{VoteStore, VoteStoreError};

const ITEM_COLUMNS: &str = "item_type, item_id, upvote_count, downvote_count, net_votes, \
     contested_score, total_engagement, version, updated_at";

const VOTE_COLUMNS: &str = "item_type, item_id, user_id, vote_value, voted_at";

/// SQLSTATE codes that mean a concurrent writer got there first.
const CONFLICT_CODES: &[&str] = &["23505", "40001", "40P01"];

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    item_type: String,
    item_id: String,
    upvote_count: i64,
    downvote_count: i64,
    net_votes: i64,
    contested_score: i64,
    total_engagement: i64,
    version: i64,
    updated_at: DateTime<Utc>,
}

impl ItemRow {
    fn into_aggregate(self) -> ItemAggregate {
        ItemAggregate {
            item: ItemRef::new(ItemKind::new(self.item_type), self.item_id),
            upvote_count: self.upvote_count,
            downvote_count: self.downvote_count,
            net_votes: self.net_votes,
            contested_score: self.contested_score,
            total_engagement: self.total_engagement,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct VoteRow {
    item_type: String,
    item_id: String,
    user_id: String,
    vote_value: i16,
    voted_at: DateTime<Utc>,
}

impl TryFrom<VoteRow> for Vote {
    type Error = VoteStoreError;

    fn try_from(row: VoteRow) -> Result<Self, Self::Error> {
        let value = VoteValue::from_i64(i64::from(row.vote_value))
            .ok_or(VoteStoreError::InvalidVoteValue(row.vote_value))?;
        Ok(Vote {
            item: ItemRef::new(ItemKind::new(row.item_type), row.item_id),
            user_id: UserId::new(row.user_id),
            value,
            voted_at: row.voted_at,
        })
    }
}

fn into_votes(rows: Vec<VoteRow>) -> Result<Vec<Vote>, VoteStoreError> {
    rows.into_iter().map(Vote::try_from).collect()
}

fn vote_value(value: VoteValue) -> i16 {
    match value {
        VoteValue::Up => 1,
        VoteValue::Down => -1,
    }
}

/// Maps write errors caused by a concurrent transaction to `Conflict`.
fn classify_write_error(error: sqlx::Error, item: &ItemRef) -> VoteStoreError {
    let is_conflict = error
        .as_database_error()
        .and_then(|db_error| db_error.code())
        .is_some_and(|code| CONFLICT_CODES.contains(&code.as_ref()));

    if is_conflict {
        VoteStoreError::Conflict(item.to_string())
    } else {
        VoteStoreError::DatabaseError(error)
    }
}

/// PostgreSQL implementation of the vote store.
///
/// Votes live in `user_votes`; the cached aggregate and the optimistic
/// concurrency version of each item live in `vote_items`.
pub struct PostgresVoteStore {
    pool: sqlx::PgPool,
}

impl PostgresVoteStore {
    /// Creates a new PostgreSQL vote store.
    ///
    /// # Arguments
    ///
    /// * `pool` - Configured PostgreSQL connection pool with the vote schema
    ///
    /// # Returns
    ///
    /// * `Ok(PostgresVoteStore)` - Ready-to-use store
    /// * `Err(VoteStoreError)` - Future validation errors (currently always succeeds)
    pub async fn new(pool: sqlx::PgPool) -> Result<Self, VoteStoreError> {
        Ok(Self { pool })
    }

    /// Applies the caller's vote mutation inside the commit transaction.
    ///
    /// Returns the number of affected rows; zero means another transaction
    /// already changed the caller's vote.
    async fn apply_mutation_tx(
        &self,
        commit: &VoteCommit,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<u64, sqlx::Error> {
        let item = &commit.item;
        let result = match &commit.mutation {
            VoteMutation::Insert(vote) => {
                sqlx::query(
                    r#"
                    INSERT INTO user_votes (item_type, item_id, user_id, vote_value, voted_at)
                    VALUES ($1, $2, $3, $4, $5)
                    ON CONFLICT (item_type, item_id, user_id) DO NOTHING
                    "#,
                )
                .bind(item.kind.as_str())
                .bind(&item.id)
                .bind(vote.user_id.as_str())
                .bind(vote_value(vote.value))
                .bind(vote.voted_at)
                .execute(&mut **tx)
                .await?
            }
            VoteMutation::Update(vote) => {
                sqlx::query(
                    r#"
                    UPDATE user_votes
                    SET vote_value = $4, voted_at = $5
                    WHERE item_type = $1 AND item_id = $2 AND user_id = $3
                    "#,
                )
                .bind(item.kind.as_str())
                .bind(&item.id)
                .bind(vote.user_id.as_str())
                .bind(vote_value(vote.value))
                .bind(vote.voted_at)
                .execute(&mut **tx)
                .await?
            }
            VoteMutation::Delete { user_id } => {
                sqlx::query(
                    "DELETE FROM user_votes WHERE item_type = $1 AND item_id = $2 AND user_id = $3",
                )
                .bind(item.kind.as_str())
                .bind(&item.id)
                .bind(user_id.as_str())
                .execute(&mut **tx)
                .await?
            }
        };
        Ok(result.rows_affected())
    }

    /// Replaces the aggregate if the item is still at the expected version.
    async fn update_aggregate_tx(
        &self,
        commit: &VoteCommit,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<u64, sqlx::Error> {
        let aggregate = &commit.aggregate;
        let result = sqlx::query(
            r#"
            UPDATE vote_items
            SET upvote_count = $3,
                downvote_count = $4,
                net_votes = $5,
                contested_score = $6,
                total_engagement = $7,
                updated_at = $8,
                version = version + 1
            WHERE item_type = $1 AND item_id = $2 AND version = $9
            "#,
        )
        .bind(commit.item.kind.as_str())
        .bind(&commit.item.id)
        .bind(aggregate.upvote_count)
        .bind(aggregate.downvote_count)
        .bind(aggregate.net_votes)
        .bind(aggregate.contested_score)
        .bind(aggregate.total_engagement)
        .bind(aggregate.updated_at)
        .bind(commit.expected_version)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl VoteStore for PostgresVoteStore {
    async fn create_item(&self, item: &ItemRef, at: DateTime<Utc>) -> Result<(), VoteStoreError> {
        sqlx::query(
            r#"
            INSERT INTO vote_items (item_type, item_id, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (item_type, item_id) DO NOTHING
            "#,
        )
        .bind(item.kind.as_str())
        .bind(&item.id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Reads the item row and all of its votes in one `REPEATABLE READ`
    /// transaction, so the counts and the version describe the same state.
    async fn read_snapshot(
        &self,
        item: &ItemRef,
        user_id: &UserId,
    ) -> Result<Option<VoteSnapshot>, VoteStoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let row: Option<ItemRow> = sqlx::query_as(&format!(
            "SELECT {ITEM_COLUMNS} FROM vote_items WHERE item_type = $1 AND item_id = $2"
        ))
        .bind(item.kind.as_str())
        .bind(&item.id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.commit().await?;
            return Ok(None);
        };

        let vote_rows: Vec<VoteRow> = sqlx::query_as(&format!(
            "SELECT {VOTE_COLUMNS} FROM user_votes WHERE item_type = $1 AND item_id = $2 ORDER BY user_id"
        ))
        .bind(item.kind.as_str())
        .bind(&item.id)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        let item_votes = into_votes(vote_rows)?;
        let existing_vote = item_votes.iter().find(|vote| &vote.user_id == user_id).cloned();
        let version = row.version;

        Ok(Some(VoteSnapshot {
            aggregate: row.into_aggregate(),
            version,
            existing_vote,
            item_votes,
        }))
    }

    /// Commits the aggregate first so that the version check takes the row
    /// lock before the vote row is touched. Dropping the transaction on an
    /// early return rolls it back.
    async fn commit_vote(&self, commit: &VoteCommit) -> Result<(), VoteStoreError> {
        let item = &commit.item;
        let mut tx = self.pool.begin().await?;

        let updated = self
            .update_aggregate_tx(commit, &mut tx)
            .await
            .map_err(|e| classify_write_error(e, item))?;
        if updated == 0 {
            debug!(item = %item, expected_version = commit.expected_version, "Rejecting stale vote commit");
            return Err(VoteStoreError::Conflict(item.to_string()));
        }

        let mutated = self
            .apply_mutation_tx(commit, &mut tx)
            .await
            .map_err(|e| classify_write_error(e, item))?;
        if mutated == 0 {
            return Err(VoteStoreError::Conflict(item.to_string()));
        }

        tx.commit().await.map_err(|e| classify_write_error(e, item))?;
        Ok(())
    }

    async fn get_aggregate(&self, item: &ItemRef) -> Result<Option<ItemAggregate>, VoteStoreError> {
        let row: Option<ItemRow> = sqlx::query_as(&format!(
            "SELECT {ITEM_COLUMNS} FROM vote_items WHERE item_type = $1 AND item_id = $2"
        ))
        .bind(item.kind.as_str())
        .bind(&item.id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ItemRow::into_aggregate))
    }

    async fn get_aggregates(
        &self,
        kind: &ItemKind,
        item_ids: &[String],
    ) -> Result<Vec<ItemAggregate>, VoteStoreError> {
        if item_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<ItemRow> = sqlx::query_as(&format!(
            "SELECT {ITEM_COLUMNS} FROM vote_items WHERE item_type = $1 AND item_id = ANY($2)"
        ))
        .bind(kind.as_str())
        .bind(item_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_id: HashMap<String, ItemAggregate> = rows
            .into_iter()
            .map(|row| (row.item_id.clone(), row.into_aggregate()))
            .collect();
        Ok(item_ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn get_vote(&self, item: &ItemRef, user_id: &UserId) -> Result<Option<Vote>, VoteStoreError> {
        let row: Option<VoteRow> = sqlx::query_as(&format!(
            "SELECT {VOTE_COLUMNS} FROM user_votes WHERE item_type = $1 AND item_id = $2 AND user_id = $3"
        ))
        .bind(item.kind.as_str())
        .bind(&item.id)
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Vote::try_from).transpose()
    }

    async fn get_user_votes(
        &self,
        user_id: &UserId,
        kind: &ItemKind,
        item_ids: &[String],
    ) -> Result<Vec<Vote>, VoteStoreError> {
        if item_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<VoteRow> = sqlx::query_as(&format!(
            "SELECT {VOTE_COLUMNS} FROM user_votes WHERE user_id = $1 AND item_type = $2 AND item_id = ANY($3)"
        ))
        .bind(user_id.as_str())
        .bind(kind.as_str())
        .bind(item_ids)
        .fetch_all(&self.pool)
        .await?;
        into_votes(rows)
    }

    async fn list_item_votes(&self, item: &ItemRef) -> Result<Vec<Vote>, VoteStoreError> {
        let rows: Vec<VoteRow> = sqlx::query_as(&format!(
            "SELECT {VOTE_COLUMNS} FROM user_votes WHERE item_type = $1 AND item_id = $2 ORDER BY user_id"
        ))
        .bind(item.kind.as_str())
        .bind(&item.id)
        .fetch_all(&self.pool)
        .await?;
        into_votes(rows)
    }

    async fn list_items(&self, kind: &ItemKind) -> Result<Vec<ItemAggregate>, VoteStoreError> {
        let rows: Vec<ItemRow> = sqlx::query_as(&format!(
            "SELECT {ITEM_COLUMNS} FROM vote_items WHERE item_type = $1 ORDER BY item_id"
        ))
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ItemRow::into_aggregate).collect())
    }

    async fn top_by_net_votes(
        &self,
        kind: &ItemKind,
        limit: usize,
    ) -> Result<Vec<ItemAggregate>, VoteStoreError> {
        let rows: Vec<ItemRow> = sqlx::query_as(&format!(
            r#"
            SELECT {ITEM_COLUMNS} FROM vote_items
            WHERE item_type = $1 AND net_votes > 0
            ORDER BY net_votes DESC, item_id
            LIMIT $2
            "#
        ))
        .bind(kind.as_str())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ItemRow::into_aggregate).collect())
    }

    async fn top_by_contested_score(
        &self,
        kind: &ItemKind,
        limit: usize,
        min_engagement: i64,
    ) -> Result<Vec<ItemAggregate>, VoteStoreError> {
        let rows: Vec<ItemRow> = sqlx::query_as(&format!(
            r#"
            SELECT {ITEM_COLUMNS} FROM vote_items
            WHERE item_type = $1 AND total_engagement >= $2
            ORDER BY contested_score DESC, item_id
            LIMIT $3
            "#
        ))
        .bind(kind.as_str())
        .bind(min_engagement)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ItemRow::into_aggregate).collect())
    }

    async fn list_user_votes(&self, user_id: &UserId) -> Result<Vec<Vote>, VoteStoreError> {
        let rows: Vec<VoteRow> = sqlx::query_as(&format!(
            "SELECT {VOTE_COLUMNS} FROM user_votes WHERE user_id = $1 ORDER BY voted_at DESC, item_type, item_id"
        ))
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        into_votes(rows)
    }
}
