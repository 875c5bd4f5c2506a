use std::time::Duration;

use crate::config::ProviderSettings;

const MAX_DELAY: Duration = Duration::from_secs(30);

/// Bounded exponential backoff for retryable adapter failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &ProviderSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            base_delay: settings.retry_backoff(),
        }
    }

    /// Delay before retry number `retry` (1-based): `base * 2^(retry-1)`, capped.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1 << exponent)
            .min(MAX_DELAY)
    }

    /// Like `delay_for`, but waits at least as long as a provider-supplied hint.
    pub fn delay_with_hint(&self, retry: u32, hint: Option<Duration>) -> Duration {
        let delay = self.delay_for(retry);
        match hint {
            Some(hint) => delay.max(hint).min(MAX_DELAY),
            None => delay,
        }
    }
}
