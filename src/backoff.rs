//! Exponential backoff with optional jitter.
//!
//! A [`Backoff`] is advanced with [`Backoff::next`] after every failing batch
//! and returned to its minimum with [`Backoff::reset`] after a fully delivered
//! one. It holds no clock; the caller decides how to wait.
//!
//! ```rust
//! use kinesis_shipper::backoff::Backoff;
//! use std::time::Duration;
//!
//! let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(1), false);
//! assert_eq!(backoff.next(), Duration::from_millis(100));
//! assert_eq!(backoff.next(), Duration::from_millis(200));
//! backoff.reset();
//! assert_eq!(backoff.next(), Duration::from_millis(100));
//! ```

use crate::config::BackoffConfig;
use rand::Rng;
use std::time::Duration;

pub const DEFAULT_FACTOR: f64 = 2.0;

#[derive(Debug, Clone)]
pub struct Backoff {
    min: Duration,
    max: Duration,
    factor: f64,
    jitter: bool,
    attempt: u32,
}

impl Backoff {
    pub fn new(min: Duration, max: Duration, jitter: bool) -> Self {
        Self {
            min,
            max: max.max(min),
            factor: DEFAULT_FACTOR,
            jitter,
            attempt: 0,
        }
    }

    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::new(config.min(), config.max(), config.jitter).with_factor(config.factor)
    }

    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = if factor.is_nan() || factor < 1.0 {
            1.0
        } else {
            factor
        };
        self
    }

    /// Returns the delay for the current attempt and advances to the next one.
    ///
    /// Without jitter the sequence is `min, min*factor, min*factor^2, ...`
    /// clamped at `max`. With jitter the value is drawn uniformly from
    /// `[min, computed]`.
    pub fn next(&mut self) -> Duration {
        let computed = self.duration_for(self.attempt);
        self.attempt = self.attempt.saturating_add(1);

        if !self.jitter || computed <= self.min {
            return computed;
        }

        let min = self.min.as_nanos() as f64;
        let spread = computed.as_nanos() as f64 - min;
        let jittered = min + rand::thread_rng().gen::<f64>() * spread;
        Duration::from_nanos(jittered.round() as u64).clamp(self.min, computed)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    fn duration_for(&self, attempt: u32) -> Duration {
        let min = self.min.as_nanos() as f64;
        let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
        let scaled = (min * self.factor.powi(exp)).round();

        if !scaled.is_finite() || scaled >= self.max.as_nanos() as f64 {
            return self.max;
        }

        Duration::from_nanos(scaled as u64).max(self.min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grows_exponentially_up_to_max() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(1), false);

        let delays: Vec<Duration> = (0..6).map(|_| backoff.next()).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
                Duration::from_millis(800),
                Duration::from_secs(1),
                Duration::from_secs(1),
            ]
        );
    }

    #[test]
    fn test_non_decreasing_without_jitter() {
        let mut backoff = Backoff::new(Duration::from_millis(3), Duration::from_millis(50), false)
            .with_factor(1.5);

        let mut previous = Duration::ZERO;
        for _ in 0..40 {
            let next = backoff.next();
            assert!(next >= previous);
            assert!(next <= Duration::from_millis(50));
            previous = next;
        }
        assert_eq!(previous, Duration::from_millis(50));
    }

    #[test]
    fn test_reset_returns_to_min() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(10), false);
        backoff.next();
        backoff.next();
        backoff.next();
        assert_eq!(backoff.attempt(), 3);

        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.next(), Duration::from_millis(100));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(2), true);

        for attempt in 0..20u32 {
            let ceiling = Duration::from_millis(100)
                .saturating_mul(2u32.saturating_pow(attempt))
                .min(Duration::from_secs(2));
            let delay = backoff.next();
            assert!(delay >= Duration::from_millis(100), "{:?}", delay);
            assert!(delay <= ceiling, "{:?} > {:?}", delay, ceiling);
        }

        backoff.reset();
        assert_eq!(backoff.next(), Duration::from_millis(100));
    }

    #[test]
    fn test_huge_attempt_count_saturates() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(60), false);
        backoff.attempt = u32::MAX;
        assert_eq!(backoff.next(), Duration::from_secs(60));
        assert_eq!(backoff.next(), Duration::from_secs(60));
    }

    #[test]
    fn test_from_config() {
        let config = BackoffConfig {
            min_ms: 10,
            max_ms: 100,
            factor: 3.0,
            jitter: false,
        };
        let mut backoff = Backoff::from_config(&config);
        assert_eq!(backoff.next(), Duration::from_millis(10));
        assert_eq!(backoff.next(), Duration::from_millis(30));
        assert_eq!(backoff.next(), Duration::from_millis(90));
        assert_eq!(backoff.next(), Duration::from_millis(100));
    }
}
