//! Bounded polling.
//!
//! The channel offers no push notification, so every wait in the crate is a
//! fixed-interval polling loop with an explicit budget. A [`Deadline`] ends
//! only the loop; an evaluation already in flight is left to complete.

use std::time::Duration;
use tokio::time::Instant;

/// Polling interval shared by every wait and convergence loop (100ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Default budget for `wait_for_invoke` (10 seconds)
pub const DEFAULT_INVOKE_TIMEOUT_MS: u64 = 10_000;

/// Default budget for `scroll_to_index` (5 seconds)
pub const DEFAULT_SCROLL_TIMEOUT_MS: u64 = 5_000;

/// Default budget for `scroll_to_item` (10 seconds)
pub const DEFAULT_SEARCH_TIMEOUT_MS: u64 = 10_000;

/// Options for a polling wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_INVOKE_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WaitOptions {
    /// Options with the given timeout and the default interval
    #[must_use]
    pub const fn with_timeout(timeout_ms: u64) -> Self {
        Self {
            timeout_ms,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Get poll interval as Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Start the clock
    #[must_use]
    pub fn deadline(&self) -> Deadline {
        Deadline::after(Duration::from_millis(self.timeout_ms))
    }
}

/// A point in time after which a polling loop gives up
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    /// Deadline `budget` from now
    #[must_use]
    pub fn after(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    /// Whether the budget is used up
    #[must_use]
    pub fn expired(&self) -> bool {
        self.started.elapsed() >= self.budget
    }

    /// Time spent so far
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Budget in milliseconds
    #[must_use]
    pub fn budget_ms(&self) -> u64 {
        self.budget.as_millis() as u64
    }
}

/// Monotonic session clock; every record timestamp comes from here
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    origin: Instant,
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::start()
    }
}

impl SessionClock {
    /// Start a clock at zero
    #[must_use]
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Milliseconds since the clock started
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}
