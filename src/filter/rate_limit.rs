//! Strict periodic gate.
//!
//! Not a token bucket: a burst after a quiet period still gets exactly one
//! line through, then waits a full interval.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::{Filter, FilterError};

/// Lets at most one line through per `window / count`.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    /// Earliest instant the next line may pass.
    next_allowed: Mutex<Instant>,
}

impl RateLimiter {
    /// Allow `count` lines per `window`.
    pub fn new(window: Duration, count: u32) -> Result<Self, FilterError> {
        if count == 0 || window.is_zero() {
            return Err(FilterError::InvalidRate {
                window_ms: window.as_millis(),
                count,
            });
        }

        Ok(Self {
            interval: window / count,
            next_allowed: Mutex::new(Instant::now()),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn apply_at(&self, line: String, now: Instant) -> Option<String> {
        let mut next = self.next_allowed.lock();
        if now < *next {
            return None;
        }
        *next = now + self.interval;
        Some(line)
    }
}

impl Filter for RateLimiter {
    fn apply(&self, line: String) -> Option<String> {
        self.apply_at(line, Instant::now())
    }
}
