//! Exponential backoff for retryable election operations.
//!
//! Registration, watch setup, and lease acquisition all retry on transient
//! store failures. The delay between attempts grows geometrically from a small
//! initial value up to a cap (conventionally the election TTL - waiting longer
//! than the TTL is pointless, the lease is gone by then).

use std::time::Duration;

/// Produces a growing sequence of retry delays.
///
/// The `i`-th call to [`next`](BackoffCounter::next) returns
/// `min(initial * multiplier^i, cap)`: strictly increasing until the cap is
/// reached, then flat. [`reset`](BackoffCounter::reset) restarts the sequence.
///
/// The counter is owned by a single task and is not thread-safe; retry loops
/// create one and drive it locally.
#[derive(Debug, Clone)]
pub struct BackoffCounter {
    initial: Duration,
    cap: Duration,
    multiplier: f64,
    attempts: u32,
}

impl BackoffCounter {
    /// Creates a counter starting at `initial`, growing by `multiplier` per
    /// attempt, and never exceeding `cap`.
    pub fn new(initial: Duration, cap: Duration, multiplier: f64) -> Self {
        Self {
            initial,
            cap,
            multiplier,
            attempts: 0,
        }
    }

    /// Returns the next delay in the sequence and advances the counter.
    pub fn next(&mut self) -> Duration {
        let delay = self
            .initial
            .mul_f64(self.multiplier.powi(self.attempts as i32))
            .min(self.cap);
        self.attempts = self.attempts.saturating_add(1);
        delay
    }

    /// Restarts the sequence from the initial delay.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Number of delays handed out since construction or the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_doubles_until_cap() {
        let mut backoff = BackoffCounter::new(
            Duration::from_millis(500),
            Duration::from_secs(5),
            2.0,
        );

        assert_eq!(backoff.next(), Duration::from_millis(500));
        assert_eq!(backoff.next(), Duration::from_secs(1));
        assert_eq!(backoff.next(), Duration::from_secs(2));
        assert_eq!(backoff.next(), Duration::from_secs(4));
        // 8s would exceed the cap
        assert_eq!(backoff.next(), Duration::from_secs(5));
        assert_eq!(backoff.next(), Duration::from_secs(5));
    }

    #[test]
    fn test_reset_restarts_sequence() {
        let mut backoff = BackoffCounter::new(
            Duration::from_millis(500),
            Duration::from_secs(5),
            2.0,
        );

        backoff.next();
        backoff.next();
        assert_eq!(backoff.attempts(), 2);

        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert_eq!(backoff.next(), Duration::from_millis(500));
    }

    #[test]
    fn test_cap_smaller_than_initial() {
        let mut backoff = BackoffCounter::new(
            Duration::from_secs(2),
            Duration::from_secs(1),
            2.0,
        );

        assert_eq!(backoff.next(), Duration::from_secs(1));
        assert_eq!(backoff.next(), Duration::from_secs(1));
    }

    #[test]
    fn test_large_attempt_count_saturates() {
        let mut backoff = BackoffCounter::new(
            Duration::from_millis(500),
            Duration::from_secs(5),
            2.0,
        );

        for _ in 0..64 {
            let delay = backoff.next();
            assert!(delay <= Duration::from_secs(5));
        }
        assert_eq!(backoff.next(), Duration::from_secs(5));
    }
}
