//! Configuration module for the Engagement service.
//! Reads settings from the environment and wires the voting components.
mod dependencies;

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use dotenv::dotenv;
use engagement_engine::EngineConfig;
use engagement_engine::notifier::DEFAULT_DEBOUNCE;
use engagement_shared::types::{DEFAULT_ITEM_KINDS, ItemKindRegistry};

use crate::EngagementError;

pub use dependencies::Dependencies;

/// Default maximum number of pooled database connections.
const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Settings for the whole voting service.
#[derive(Debug, Clone)]
pub struct EngagementConfig {
    /// PostgreSQL URL; votes are kept in memory when absent.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub item_kinds: ItemKindRegistry,
    pub engine: EngineConfig,
    /// Quiet period before a subscriber is told about a change.
    pub debounce: Duration,
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            database_max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
            item_kinds: ItemKindRegistry::default(),
            engine: EngineConfig::default(),
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

impl EngagementConfig {
    /// Reads the configuration from environment variables, after loading a
    /// `.env` file if one is present.
    ///
    /// # Environment Variables
    ///
    /// - `DATABASE_URL`: PostgreSQL URL (default: unset, in-memory store)
    /// - `DATABASE_MAX_CONNECTIONS`: pool size (default: 10)
    /// - `VOTE_ITEM_KINDS`: comma-separated votable kinds (default: asset,note)
    /// - `VOTE_RATE_LIMIT_WINDOW_SECS`: rate limit window (default: 60)
    /// - `VOTE_RATE_LIMIT_MAX`: votes accepted per window (default: 100)
    /// - `VOTE_MAX_RETRIES`: retries on write conflicts (default: 5)
    /// - `VOTE_RETRY_BASE_DELAY_MS`: first retry delay (default: 10)
    /// - `VOTE_RETRY_MAX_DELAY_MS`: retry delay cap (default: 1000)
    /// - `VOTE_ATTEMPT_TIMEOUT_MS`: store call timeout (default: 5000)
    /// - `VOTE_DEBOUNCE_MS`: subscription debounce (default: 2000)
    /// - `VOTE_FEED_CAPACITY`: aggregate feed buffer (default: 1024)
    ///
    /// # Returns
    ///
    /// * `Ok(EngagementConfig)` - The parsed configuration
    /// * `Err(EngagementError::Config)` - A variable is set but not valid
    pub fn from_env() -> Result<Self, EngagementError> {
        dotenv().ok();
        let defaults = EngineConfig::default();

        let database_url = env::var("DATABASE_URL")
            .ok()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        let item_kinds = match env::var("VOTE_ITEM_KINDS") {
            Ok(raw) => ItemKindRegistry::new(raw.split(',')),
            Err(_) => ItemKindRegistry::new(DEFAULT_ITEM_KINDS),
        };
        if item_kinds.kinds().next().is_none() {
            return Err(EngagementError::config("VOTE_ITEM_KINDS lists no item kinds"));
        }

        let engine = EngineConfig {
            rate_limit_window: Duration::from_secs(parse_var(
                "VOTE_RATE_LIMIT_WINDOW_SECS",
                defaults.rate_limit_window.as_secs(),
            )?),
            rate_limit_max: parse_var("VOTE_RATE_LIMIT_MAX", defaults.rate_limit_max)?,
            max_retries: parse_var("VOTE_MAX_RETRIES", defaults.max_retries)?,
            retry_base_delay: millis_var("VOTE_RETRY_BASE_DELAY_MS", defaults.retry_base_delay)?,
            retry_max_delay: millis_var("VOTE_RETRY_MAX_DELAY_MS", defaults.retry_max_delay)?,
            attempt_timeout: millis_var("VOTE_ATTEMPT_TIMEOUT_MS", defaults.attempt_timeout)?,
            feed_capacity: parse_var("VOTE_FEED_CAPACITY", defaults.feed_capacity)?,
        };
        if engine.feed_capacity == 0 {
            return Err(EngagementError::config("VOTE_FEED_CAPACITY must be positive"));
        }

        Ok(Self {
            database_url,
            database_max_connections: parse_var(
                "DATABASE_MAX_CONNECTIONS",
                DEFAULT_DATABASE_MAX_CONNECTIONS,
            )?,
            item_kinds,
            engine,
            debounce: millis_var("VOTE_DEBOUNCE_MS", DEFAULT_DEBOUNCE)?,
        })
    }
}

/// Parses an optional variable, falling back to `default` when unset.
fn parse_var<T>(name: &str, default: T) -> Result<T, EngagementError>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| EngagementError::config(format!("Invalid {name}={raw:?}: {e}"))),
        Err(_) => Ok(default),
    }
}

fn millis_var(name: &str, default: Duration) -> Result<Duration, EngagementError> {
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    Ok(Duration::from_millis(parse_var(name, default_ms)?))
}
