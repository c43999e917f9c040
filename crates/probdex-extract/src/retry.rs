//! Per-page retry policy.

use std::time::Duration;

/// Maximum attempts per page.
pub const MAX_ATTEMPTS: u32 = 3;
/// Delay between attempts in fixed mode.
pub const FIXED_RETRY_DELAY: Duration = Duration::from_secs(15);
/// First delay in exponential mode.
pub const EXPONENTIAL_BASE: Duration = Duration::from_secs(2);

/// Wait schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// `base * 2^retry`.
    Exponential { base: Duration },
    Fixed(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Same attempt budget with no waiting.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Backoff::Fixed(Duration::ZERO))
    }

    /// Wait before retry number `retry` (0 for the first retry).
    pub fn delay_for(&self, retry: u32) -> Duration {
        match self.backoff {
            Backoff::Exponential { base } => base.saturating_mul(2u32.saturating_pow(retry)),
            Backoff::Fixed(delay) => delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(MAX_ATTEMPTS, Backoff::Exponential { base: EXPONENTIAL_BASE })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(2));
        assert_eq!(policy.delay_for(1), Duration::from_secs(4));
        assert_eq!(policy.delay_for(2), Duration::from_secs(8));
    }

    #[test]
    fn test_fixed_delays() {
        let policy = RetryPolicy::new(3, Backoff::Fixed(FIXED_RETRY_DELAY));
        assert_eq!(policy.delay_for(0), Duration::from_secs(15));
        assert_eq!(policy.delay_for(5), Duration::from_secs(15));
    }

    #[test]
    fn test_at_least_one_attempt() {
        assert_eq!(RetryPolicy::immediate(0).max_attempts, 1);
    }
}
