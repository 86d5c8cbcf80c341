//! # Fibonacci Backoff
//!
//! Requeue delays for failed reconciliations. Delays grow along the Fibonacci
//! sequence in minutes (1m, 1m, 2m, 3m, 5m, 8m, then capped at 10m) and are
//! tracked per object so one failing instance does not slow down the others.

use crate::object_state::ObjectStates;
use std::time::{Duration, Instant};

const MIN_MINUTES: u64 = 1;
const MAX_MINUTES: u64 = 10;

/// A failing object is retried at least every `MAX_MINUTES`, so an entry idle
/// for three times that belongs to an object that is gone.
const IDLE_TTL: Duration = Duration::from_secs(3 * MAX_MINUTES * 60);

/// Fibonacci backoff calculator
///
/// Each delay is the sum of the previous two, capped at `max_minutes`.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    /// Previous backoff value in minutes
    prev_minutes: u64,
    /// Current backoff value in minutes
    current_minutes: u64,
    /// Maximum backoff value in minutes
    max_minutes: u64,
}

impl FibonacciBackoff {
    /// Create a new backoff starting at `min_minutes` and capped at `max_minutes`
    #[must_use]
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            prev_minutes: 0,
            current_minutes: min_minutes,
            max_minutes,
        }
    }

    /// Current delay, advancing the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let result = Duration::from_secs(self.current_minutes * 60);

        let next_minutes = self.prev_minutes + self.current_minutes;
        self.prev_minutes = self.current_minutes;
        self.current_minutes = next_minutes.min(self.max_minutes);

        result
    }
}

impl Default for FibonacciBackoff {
    fn default() -> Self {
        Self::new(MIN_MINUTES, MAX_MINUTES)
    }
}

/// Backoff state per object key (`namespace/name`)
#[derive(Debug)]
pub struct BackoffTracker {
    states: ObjectStates<FibonacciBackoff>,
}

impl Default for BackoffTracker {
    fn default() -> Self {
        Self {
            states: ObjectStates::new(IDLE_TTL),
        }
    }
}

impl BackoffTracker {
    /// Next requeue delay for `key`
    pub fn next_delay(&self, key: &str) -> Duration {
        self.next_delay_at(key, Instant::now())
    }

    fn next_delay_at(&self, key: &str, now: Instant) -> Duration {
        self.states.with(key, now, FibonacciBackoff::next_backoff)
    }

    /// Forget the failures of `key` after a successful pass
    pub fn reset(&self, key: &str) {
        self.states.remove(key);
    }
}
