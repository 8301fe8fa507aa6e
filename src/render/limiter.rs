//! Minimum inter-arrival rate limiting.
//!
//! Throttles the *start* of render requests behind a minimum interval:
//! one mutex, one last-seen timestamp. Requests arriving too soon are
//! rejected outright - no queuing, no fairness. The limiter is a plain
//! value owned by the HTTP boundary and injected where needed; the core
//! pipeline stays free of shared mutable state.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use thiserror::Error;

/// A request arrived inside the minimum inter-arrival interval.
#[derive(Debug, Clone, Error)]
#[error("too many requests - wait a moment before trying again")]
pub struct RateLimited;

/// Serializes request starts behind a minimum inter-arrival interval.
#[derive(Debug)]
pub struct RequestLimiter {
    min_interval: Duration,
    last_start: Mutex<Option<Instant>>,
}

impl RequestLimiter {
    /// Create a limiter with the given minimum interval between request
    /// starts. A zero interval admits everything.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_start: Mutex::new(None),
        }
    }

    /// Try to start a request now.
    ///
    /// Admission records the start time; rejection does not, so a burst
    /// cannot push the window forward and starve itself.
    pub fn try_acquire(&self) -> Result<(), RateLimited> {
        if self.min_interval.is_zero() {
            return Ok(());
        }

        let now = Instant::now();
        let mut last = self
            .last_start
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(previous) = *last {
            if now.duration_since(previous) < self.min_interval {
                return Err(RateLimited);
            }
        }

        *last = Some(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_request_admitted() {
        let limiter = RequestLimiter::new(Duration::from_millis(50));
        assert!(limiter.try_acquire().is_ok());
    }

    #[test]
    fn test_request_inside_interval_rejected() {
        let limiter = RequestLimiter::new(Duration::from_millis(200));
        limiter.try_acquire().unwrap();
        assert!(limiter.try_acquire().is_err());
    }

    #[test]
    fn test_request_after_interval_admitted() {
        let limiter = RequestLimiter::new(Duration::from_millis(10));
        limiter.try_acquire().unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert!(limiter.try_acquire().is_ok());
    }

    #[test]
    fn test_zero_interval_admits_everything() {
        let limiter = RequestLimiter::new(Duration::ZERO);
        for _ in 0..10 {
            assert!(limiter.try_acquire().is_ok());
        }
    }

    #[test]
    fn test_rejection_does_not_extend_window() {
        let limiter = RequestLimiter::new(Duration::from_millis(30));
        limiter.try_acquire().unwrap();

        // Hammering during the window keeps getting rejected...
        std::thread::sleep(Duration::from_millis(15));
        assert!(limiter.try_acquire().is_err());

        // ...but does not reset it: the original window still expires
        std::thread::sleep(Duration::from_millis(20));
        assert!(limiter.try_acquire().is_ok());
    }
}
