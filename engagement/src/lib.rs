//! Engagement Library
//!
//! This library wires the voting engine together: configuration from the
//! environment, store selection and migrations, the shared component set and
//! tracing initialisation.

pub mod config;
pub mod errors;
pub mod telemetry;

pub use config::{Dependencies, EngagementConfig};
pub use errors::EngagementError;
