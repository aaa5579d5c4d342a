//! Exponential backoff schedule for transient retrieval failures.

use std::time::Duration;

use super::provider::RetrievalError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. At least 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Policy that never retries.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Sleep before retry `k` (1-based): `base · 2^(k-1)`, capped at `max_delay`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exp)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Like [`Self::delay_for`], but a rate limit's `retry_after` wins when it
    /// is longer. Still capped at `max_delay`.
    pub fn delay_after(&self, error: &RetrievalError, retry: u32) -> Duration {
        let backoff = self.delay_for(retry);
        match error {
            RetrievalError::RateLimited { retry_after_secs } => backoff
                .max(Duration::from_secs(*retry_after_secs))
                .min(self.max_delay),
            _ => backoff,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(5, Duration::from_millis(100), Duration::from_millis(1000))
    }

    #[test]
    fn doubles_then_caps() {
        let p = policy();
        assert_eq!(p.delay_for(1), Duration::from_millis(100));
        assert_eq!(p.delay_for(2), Duration::from_millis(200));
        assert_eq!(p.delay_for(3), Duration::from_millis(400));
        assert_eq!(p.delay_for(4), Duration::from_millis(800));
        assert_eq!(p.delay_for(5), Duration::from_millis(1000));
        assert_eq!(p.delay_for(60), Duration::from_millis(1000));
    }

    #[test]
    fn rate_limit_honored_up_to_cap() {
        let p = RetryPolicy::new(3, Duration::from_millis(100), Duration::from_secs(10));
        let limited = RetrievalError::RateLimited { retry_after_secs: 4 };
        assert_eq!(p.delay_after(&limited, 1), Duration::from_secs(4));

        let long = RetrievalError::RateLimited { retry_after_secs: 600 };
        assert_eq!(p.delay_after(&long, 1), Duration::from_secs(10));

        let other = RetrievalError::ServerError { status: 502 };
        assert_eq!(p.delay_after(&other, 2), Duration::from_millis(200));
    }

    #[test]
    fn at_least_one_attempt() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO, Duration::ZERO).max_attempts, 1);
        assert_eq!(RetryPolicy::no_retry().max_attempts, 1);
    }
}
