//! Engagement voting service entry point.
//!
//! Loads configuration from the environment, connects the vote store and
//! keeps the voting components alive until the process is interrupted.

use dotenv::dotenv;
use engagement::telemetry::init_tracing;
use engagement::{Dependencies, EngagementConfig, EngagementError};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), EngagementError> {
    dotenv().ok();
    init_tracing()?;

    info!("Starting engagement voting service");

    let config = EngagementConfig::from_env()?;
    let deps = match Dependencies::new(&config).await {
        Ok(deps) => {
            info!("Dependencies initialized successfully");
            deps
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize dependencies");
            return Err(e);
        }
    };

    info!(
        debounce_ms = deps.notifier.debounce().as_millis() as u64,
        rate_limit_max = deps.engine.config().rate_limit_max,
        "Voting service ready"
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        return Err(EngagementError::config(format!("Shutdown signal unavailable: {e}")));
    }

    info!("Shutting down engagement voting service");
    Ok(())
}
