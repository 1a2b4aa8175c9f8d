//! Tracing initialisation.

use std::env;

use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::EngagementError;

const DEFAULT_FILTER: &str = "engagement=info,engagement_engine=info,engagement_repository=info";

/// Initialize tracing/logging.
///
/// `RUST_LOG` overrides the default filter. `LOG_FORMAT=json` switches from
/// pretty console output to JSON lines.
pub fn init_tracing() -> Result<(), EngagementError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let json = env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .try_init()
            .map_err(|e| EngagementError::config(format!("Failed to initialize tracing: {e}")))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true).pretty())
            .try_init()
            .map_err(|e| EngagementError::config(format!("Failed to initialize tracing: {e}")))?;
    }

    info!(
        service_name = "engagement",
        service_version = env!("CARGO_PKG_VERSION"),
        json,
        "Tracing initialized"
    );
    Ok(())
}
