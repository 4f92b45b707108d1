// Exponential backoff with additive jitter
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::utils::serde::duration_millis;

/// Default jitter factor (0.0 = no jitter, 1.0 = up to double the delay)
pub const DEFAULT_JITTER_FACTOR: f64 = 0.3;

/// Maximum exponent for exponential backoff calculation to prevent overflow
pub const MAX_BACKOFF_EXPONENT: u32 = 30;

/// Delay schedule for retrying a failed operation.
///
/// Exponential policies compute `min(base * 2^attempt, max)` and then add a
/// random jitter in `[0, jitter_factor * delay]`. Flat policies always
/// return `base_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    #[serde(with = "duration_millis")]
    pub base_delay: Duration,
    #[serde(with = "duration_millis")]
    pub max_delay: Duration,
    pub exponential: bool,
    pub jitter_factor: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::exponential(Duration::from_secs(1), Duration::from_secs(10))
    }
}

impl BackoffPolicy {
    /// Exponential policy with the default jitter factor.
    pub const fn exponential(base_delay: Duration, max_delay: Duration) -> Self {
        Self { base_delay, max_delay, exponential: true, jitter_factor: DEFAULT_JITTER_FACTOR }
    }

    /// Flat policy that never waits.
    pub const fn none() -> Self {
        Self {
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            exponential: false,
            jitter_factor: 0.0,
        }
    }

    /// Set the jitter factor, clamped to `0.0..=1.0`
    #[must_use]
    pub fn with_jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = factor.clamp(0.0, 1.0);
        self
    }

    /// Calculate delay for a given attempt with backoff and jitter
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if !self.exponential {
            return self.base_delay;
        }
        self.apply_jitter(self.base_delay_for(attempt))
    }

    /// Delay before jitter is applied.
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        if !self.exponential {
            return self.base_delay;
        }

        let base_millis = self.base_delay.as_millis() as u64;
        let max_millis = self.max_delay.as_millis() as u64;

        // Cap exponent to prevent overflow
        let exponent = attempt.min(MAX_BACKOFF_EXPONENT);
        let multiplier = 2_u64.saturating_pow(exponent);

        Duration::from_millis(base_millis.saturating_mul(multiplier).min(max_millis))
    }

    /// Largest value `delay_for(attempt)` can return.
    pub fn upper_bound_for(&self, attempt: u32) -> Duration {
        let delay = self.base_delay_for(attempt);
        if !self.exponential {
            return delay;
        }
        let extra = (delay.as_millis() as f64 * self.jitter_factor).floor() as u64;
        delay + Duration::from_millis(extra)
    }

    fn apply_jitter(&self, delay: Duration) -> Duration {
        if self.jitter_factor == 0.0 || delay.is_zero() {
            return delay;
        }

        let delay_millis = delay.as_millis() as f64;
        let jitter = rand::thread_rng().gen_range(0.0..=delay_millis * self.jitter_factor);

        Duration::from_millis((delay_millis + jitter).floor() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_delay_doubles_until_cap() {
        let policy =
            BackoffPolicy::exponential(Duration::from_millis(1000), Duration::from_millis(10_000))
                .with_jitter_factor(0.0);

        assert_eq!(policy.delay_for(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(8000));
        assert_eq!(policy.delay_for(4), Duration::from_millis(10_000));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_millis(10_000));
    }

    #[test]
    fn jitter_stays_within_thirty_percent() {
        let policy =
            BackoffPolicy::exponential(Duration::from_millis(500), Duration::from_millis(5000));

        for attempt in 0..6 {
            let floor = policy.base_delay_for(attempt);
            let ceiling = policy.upper_bound_for(attempt);
            for _ in 0..50 {
                let delay = policy.delay_for(attempt);
                assert!(delay >= floor, "{delay:?} < {floor:?}");
                assert!(delay <= ceiling, "{delay:?} > {ceiling:?}");
            }
        }
    }

    #[test]
    fn none_policy_never_waits() {
        let policy = BackoffPolicy::none();
        assert_eq!(policy.delay_for(0), Duration::ZERO);
        assert_eq!(policy.delay_for(7), Duration::ZERO);
        assert_eq!(policy.upper_bound_for(3), Duration::ZERO);
    }
}
