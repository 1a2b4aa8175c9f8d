//! Dependency initialization and wiring for the voting service.
use std::sync::Arc;

use engagement_engine::{
    AggregateNotifier, Clock, SystemClock, VoteEngine, VoteHistory, VoteQueries,
};
use engagement_repository::postgres::MIGRATOR;
use engagement_repository::{InMemoryVoteStore, PostgresVoteStore, VoteStore};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::{EngagementConfig, EngagementError};

/// `Dependencies` holds the voting components, all built over one shared
/// vote store.
pub struct Dependencies {
    pub store: Arc<dyn VoteStore>,
    pub engine: Arc<VoteEngine>,
    pub queries: VoteQueries,
    pub notifier: AggregateNotifier,
    pub history: VoteHistory,
}

impl Dependencies {
    /// Creates a new `Dependencies` instance.
    ///
    /// Connects to PostgreSQL and applies the schema migrations when a
    /// database URL is configured; otherwise votes are kept in memory.
    ///
    /// # Returns
    ///
    /// A `Result` which is `Ok(Self)` on successful initialization or an
    /// `EngagementError` if the database cannot be reached or migrated.
    pub async fn new(config: &EngagementConfig) -> Result<Self, EngagementError> {
        let store: Arc<dyn VoteStore> = match &config.database_url {
            Some(database_url) => {
                let pool = PgPoolOptions::new()
                    .max_connections(config.database_max_connections)
                    .connect(database_url)
                    .await?;
                MIGRATOR.run(&pool).await?;
                info!(
                    max_connections = config.database_max_connections,
                    "Connected to PostgreSQL vote store"
                );
                Arc::new(PostgresVoteStore::new(pool).await?)
            }
            None => {
                warn!("DATABASE_URL is not set; votes are kept in memory and lost on restart");
                Arc::new(InMemoryVoteStore::new())
            }
        };

        Ok(Self::with_store(store, Arc::new(SystemClock), config))
    }

    /// Wires the components over an existing store and clock.
    pub fn with_store(
        store: Arc<dyn VoteStore>,
        clock: Arc<dyn Clock>,
        config: &EngagementConfig,
    ) -> Self {
        let engine = Arc::new(VoteEngine::new(
            store.clone(),
            clock,
            config.item_kinds.clone(),
            config.engine.clone(),
        ));
        let queries = VoteQueries::new(store.clone(), config.item_kinds.clone());
        let notifier = AggregateNotifier::new(&engine, config.debounce);
        let history = VoteHistory::new(store.clone());

        info!(
            item_kinds = ?config.item_kinds.kinds().collect::<Vec<_>>(),
            rate_limit_max = config.engine.rate_limit_max,
            max_retries = config.engine.max_retries,
            "Voting components initialized"
        );

        Self {
            store,
            engine,
            queries,
            notifier,
            history,
        }
    }
}
