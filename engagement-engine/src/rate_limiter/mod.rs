//! Process-local fixed-window call gate.
//!
//! The limiter bounds how many vote calls this process accepts per window. It
//! is not shared between processes and is not keyed per user.
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::warn;

use crate::clock::Clock;

/// Default length of a rate window.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Default number of calls accepted per window.
pub const DEFAULT_MAX_PER_WINDOW: u64 = 100;

#[derive(Debug)]
struct RateWindow {
    window_start: DateTime<Utc>,
    count_in_window: u64,
}

/// Fixed-window rate limiter.
///
/// Each call to [`RateLimiter::allow`] counts against the current window,
/// including the calls it denies.
pub struct RateLimiter {
    clock: Arc<dyn Clock>,
    window: TimeDelta,
    max_per_window: u64,
    state: Mutex<RateWindow>,
}

impl RateLimiter {
    pub fn new(clock: Arc<dyn Clock>, window: Duration, max_per_window: u64) -> Self {
        let window_start = clock.now();
        Self {
            clock,
            window: TimeDelta::from_std(window).unwrap_or(TimeDelta::MAX),
            max_per_window,
            state: Mutex::new(RateWindow {
                window_start,
                count_in_window: 0,
            }),
        }
    }

    /// Creates a limiter with the default window and maximum.
    pub fn with_defaults(clock: Arc<dyn Clock>) -> Self {
        Self::new(clock, DEFAULT_WINDOW, DEFAULT_MAX_PER_WINDOW)
    }

    /// Counts a call and reports whether it is within the limit.
    ///
    /// Once the window boundary has passed, the window restarts at the
    /// current time before the call is counted.
    pub fn allow(&self) -> bool {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if now - state.window_start >= self.window {
            state.window_start = now;
            state.count_in_window = 0;
        }

        state.count_in_window += 1;
        let allowed = state.count_in_window <= self.max_per_window;
        if !allowed {
            warn!(
                count_in_window = state.count_in_window,
                max_per_window = self.max_per_window,
                "Vote rate limit exceeded"
            );
        }
        allowed
    }

    pub fn max_per_window(&self) -> u64 {
        self.max_per_window
    }
}
