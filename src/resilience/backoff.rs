//! Exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

/// Lower bound of the jitter multiplier.
pub const JITTER_MIN: f64 = 0.75;
/// Upper bound of the jitter multiplier.
pub const JITTER_MAX: f64 = 1.25;

/// Exponential backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Growth factor applied per attempt.
    pub multiplier: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            multiplier: 2.0,
        }
    }
}

impl BackoffPolicy {
    /// Unjittered delay after the given (1-based) attempt failed.
    ///
    /// `initial_delay * multiplier^(attempt-1)`, capped at `max_delay`.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let max_ms = self.max_delay.as_millis() as f64;
        Duration::from_millis(self.uncapped_ms(attempt).min(max_ms) as u64)
    }

    /// Jittered delay: `min(initial * multiplier^(attempt-1) * jitter, max_delay)`
    /// with `jitter` uniform in `[0.75, 1.25]`.
    ///
    /// Jitter scales the uncapped exponential, so once growth is well past
    /// the cap every delay is exactly `max_delay`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let jitter = rand::thread_rng().gen_range(JITTER_MIN..=JITTER_MAX);
        self.apply_jitter(attempt, jitter)
    }

    fn apply_jitter(&self, attempt: u32, jitter: f64) -> Duration {
        let max_ms = self.max_delay.as_millis() as f64;
        Duration::from_millis((self.uncapped_ms(attempt) * jitter).min(max_ms) as u64)
    }

    fn uncapped_ms(&self, attempt: u32) -> f64 {
        let exponent = attempt.max(1) - 1;
        let factor = self.multiplier.max(1.0).powi(exponent.min(i32::MAX as u32) as i32);
        self.initial_delay.as_millis() as f64 * factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(initial: u64, max: u64, multiplier: f64) -> BackoffPolicy {
        BackoffPolicy {
            initial_delay: Duration::from_millis(initial),
            max_delay: Duration::from_millis(max),
            multiplier,
        }
    }

    #[test]
    fn test_base_delay_grows_exponentially() {
        let p = policy(100, 10_000, 2.0);
        assert_eq!(p.base_delay(1), Duration::from_millis(100));
        assert_eq!(p.base_delay(2), Duration::from_millis(200));
        assert_eq!(p.base_delay(3), Duration::from_millis(400));
        assert_eq!(p.base_delay(4), Duration::from_millis(800));
    }

    #[test]
    fn test_base_delay_capped() {
        let p = policy(1000, 5000, 2.0);
        assert_eq!(p.base_delay(3), Duration::from_millis(4000));
        assert_eq!(p.base_delay(4), Duration::from_millis(5000));
        assert_eq!(p.base_delay(60), Duration::from_millis(5000));
    }

    #[test]
    fn test_attempt_zero_treated_as_first() {
        let p = policy(250, 1000, 3.0);
        assert_eq!(p.base_delay(0), p.base_delay(1));
    }

    #[test]
    fn test_jittered_delay_within_bounds() {
        let p = policy(1000, 30_000, 2.0);
        for attempt in 1..=6 {
            let base = p.base_delay(attempt).as_millis() as f64;
            let upper = (base * JITTER_MAX).min(30_000.0);
            for _ in 0..50 {
                let d = p.delay(attempt).as_millis() as f64;
                assert!(d >= (base * JITTER_MIN).floor(), "attempt {attempt}: {d} < 0.75*{base}");
                assert!(d <= upper, "attempt {attempt}: {d} > {upper}");
            }
        }
    }

    #[test]
    fn test_jitter_extremes() {
        let p = policy(1000, 30_000, 2.0);
        assert_eq!(p.apply_jitter(1, JITTER_MIN), Duration::from_millis(750));
        assert_eq!(p.apply_jitter(1, JITTER_MAX), Duration::from_millis(1250));
        // jitter never pushes past the cap
        assert_eq!(p.apply_jitter(10, JITTER_MAX), Duration::from_millis(30_000));
    }

    #[test]
    fn test_saturated_delay_is_exactly_max() {
        let p = policy(1000, 30_000, 2.0);
        // 1000 * 2^9 = 512 s, far past the cap even at the low jitter bound
        assert_eq!(p.apply_jitter(10, JITTER_MIN), Duration::from_millis(30_000));
        assert_eq!(p.apply_jitter(60, JITTER_MIN), Duration::from_millis(30_000));
        for _ in 0..50 {
            assert_eq!(p.delay(12), Duration::from_millis(30_000));
        }

        // Near the cap the low end of the jitter range still applies.
        // 1000 * 2^5 * 0.75 = 24 s
        assert_eq!(p.apply_jitter(6, JITTER_MIN), Duration::from_millis(24_000));
    }
}
