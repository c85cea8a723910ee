//! Capped exponential backoff with jitter.
//!
//! A [`RetryPolicy`] describes the schedule; [`Backoff`] walks it. Once
//! the attempt budget is spent the iterator returns `None`, which callers
//! treat as the terminal give-up state and surface to their own caller.

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;

/// Retry schedule: `min(base * 2^attempt, max)`, scaled by a random
/// factor in `[1 - jitter, 1 + jitter]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Ceiling on any single delay (before jitter).
    pub max_delay: Duration,
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Relative jitter in `[0, 1]`.
    pub jitter: f64,
}

impl RetryPolicy {
    /// Build a policy from configuration.
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            max_attempts: config.max_attempts,
            jitter: config.jitter.clamp(0.0, 1.0),
        }
    }

    /// The same policy with a different attempt budget.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Un-jittered delay before retry number `attempt` (0-based).
    pub fn nominal_delay(&self, attempt: u32) -> Duration {
        let factor = 1_u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Jittered delay before retry number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32, rng: &mut impl Rng) -> Duration {
        let nominal = self.nominal_delay(attempt);
        if self.jitter <= 0.0 {
            return nominal;
        }
        let scale = rng.random_range((1.0 - self.jitter)..=(1.0 + self.jitter));
        nominal.mul_f64(scale)
    }

    /// Start walking the schedule.
    pub const fn backoff(&self) -> Backoff {
        Backoff {
            policy: *self,
            attempt: 0,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Iterator over the delays of a [`RetryPolicy`].
///
/// Yields one delay per retry, so `max_attempts - 1` delays in total.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    attempt: u32,
}

impl Backoff {
    /// Retries consumed so far.
    pub const fn attempts_made(&self) -> u32 {
        self.attempt
    }

    /// Whether the budget is spent.
    pub const fn exhausted(&self) -> bool {
        self.attempt.saturating_add(1) >= self.policy.max_attempts
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted() {
            return None;
        }
        let delay = self.policy.delay_for(self.attempt, &mut rand::rng());
        self.attempt = self.attempt.saturating_add(1);
        Some(delay)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn policy(jitter: f64) -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            max_attempts: 10,
            jitter,
        }
    }

    #[test]
    fn nominal_delay_doubles_until_cap() {
        let policy = policy(0.0);
        assert_eq!(policy.nominal_delay(0), Duration::from_millis(1000));
        assert_eq!(policy.nominal_delay(1), Duration::from_millis(2000));
        assert_eq!(policy.nominal_delay(4), Duration::from_millis(16_000));
        assert_eq!(policy.nominal_delay(5), Duration::from_millis(30_000));
        assert_eq!(policy.nominal_delay(40), Duration::from_millis(30_000));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let policy = policy(0.2);
        let mut rng = StdRng::seed_from_u64(7);
        for attempt in 0..8 {
            let nominal = policy.nominal_delay(attempt);
            let delay = policy.delay_for(attempt, &mut rng);
            assert!(delay >= nominal.mul_f64(0.8));
            assert!(delay <= nominal.mul_f64(1.2));
        }
    }

    #[test]
    fn backoff_gives_up_after_budget() {
        let delays: Vec<Duration> = policy(0.0).with_max_attempts(4).backoff().collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(1000),
                Duration::from_millis(2000),
                Duration::from_millis(4000),
            ]
        );
    }

    #[test]
    fn single_attempt_never_retries() {
        let mut backoff = policy(0.0).with_max_attempts(1).backoff();
        assert!(backoff.exhausted());
        assert_eq!(backoff.next(), None);
        assert_eq!(backoff.attempts_made(), 0);
    }
}
