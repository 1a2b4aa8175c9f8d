//! # Engagement Engine
//! This crate implements the voting core: the rate-limited vote transaction
//! engine, the ranking queries, the debounced realtime aggregate notifier and
//! the voting history reader.
//! Every component is an explicit value built over an injected `VoteStore`
//! and `Clock`; there is no process-wide state.
pub mod clock;
pub mod engine;
pub mod errors;
pub mod history;
pub mod notifier;
pub mod query;
pub mod rate_limiter;

#[cfg(test)]
pub(crate) mod testing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{EngineConfig, VoteEngine};
pub use errors::VoteError;
pub use history::VoteHistory;
pub use notifier::{AggregateNotifier, Subscription};
pub use query::VoteQueries;
pub use rate_limiter::RateLimiter;
