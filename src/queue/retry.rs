//! Exponential backoff for queued task retries

use std::time::Duration;

use crate::config::RetryConfig;

/// Delay before retry number `attempt` (0-based): `base * 2^attempt`, capped at `max`
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    let delay = base.saturating_mul(2u32.saturating_pow(attempt));
    std::cmp::min(delay, max)
}

impl RetryConfig {
    /// Backoff for retry number `attempt` under this configuration
    pub fn delay_for(&self, attempt: u32) -> Duration {
        calculate_backoff(
            attempt,
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_delay_ms),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        let base = Duration::from_millis(100);
        let max = Duration::from_secs(10);

        assert_eq!(calculate_backoff(0, base, max), Duration::from_millis(100));
        assert_eq!(calculate_backoff(1, base, max), Duration::from_millis(200));
        assert_eq!(calculate_backoff(3, base, max), Duration::from_millis(800));
    }

    #[test]
    fn test_backoff_is_capped() {
        let base = Duration::from_millis(100);
        let max = Duration::from_millis(500);

        assert_eq!(calculate_backoff(5, base, max), max);
        assert_eq!(calculate_backoff(40, base, max), max);
    }

    #[test]
    fn test_delay_for_uses_config() {
        let retry = RetryConfig::default();
        assert_eq!(retry.delay_for(0), Duration::from_secs(1));
        assert_eq!(retry.delay_for(2), Duration::from_secs(4));
        assert_eq!(retry.delay_for(10), Duration::from_secs(60));
    }
}
