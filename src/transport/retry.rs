//! Retry configuration and the shared fetch-with-retry primitive.
//!
//! Only transport failures are retried. A response that arrives, with
//! any status, is returned on the spot: blindly retrying a 401, 429 or
//! 5xx would amplify load on an upstream that is already refusing us.

use std::time::Duration;

use tracing::warn;

use super::{RawRequest, RawResponse, Transport};
use crate::telemetry;
use crate::{CryptarchError, Result};

/// Configuration for retry behaviour on transport failures.
///
/// Uses exponential backoff: the first retry waits `initial_delay`, each
/// following retry doubles it, capped at `max_delay`.
///
/// ```rust
/// # use cryptarch::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_attempts(5)
///     .initial_delay(Duration::from_millis(200));
/// assert_eq!(config.delay_for_attempt(1), Duration::from_millis(400));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial request).
    /// 1 = no retry. Default: 3.
    pub max_attempts: u32,
    /// Delay before the first retry. Default: 1s.
    pub initial_delay: Duration,
    /// Maximum delay between retries. Default: 30s.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config that disables retries (single attempt).
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Set maximum attempts (including the initial request).
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    /// Set the delay before the first retry.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay between retries.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay after the given failed attempt (0-indexed):
    /// `initial_delay * 2^attempt`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.max_delay)
    }
}

/// Send `request`, retrying transport failures with exponential backoff.
///
/// Returns the first HTTP response obtained, regardless of status. When
/// every attempt fails at the transport level the last transport error is
/// returned.
pub async fn fetch_with_retry(
    transport: &dyn Transport,
    request: &RawRequest,
    config: &RetryConfig,
) -> Result<RawResponse> {
    let max_attempts = config.max_attempts.max(1);
    let mut last_err = None;
    for attempt in 0..max_attempts {
        match transport.send(request).await {
            Ok(response) => return Ok(response),
            Err(e) if e.is_transient() => {
                if attempt + 1 < max_attempts {
                    let delay = config.delay_for_attempt(attempt);
                    warn!(
                        url = %request.url,
                        method = %request.method,
                        attempt = attempt + 1,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying after transport failure"
                    );
                    metrics::counter!(telemetry::RETRIES_TOTAL).increment(1);
                    tokio::time::sleep(delay).await;
                }
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or_else(|| CryptarchError::Transport("no attempt made".into())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_per_attempt() {
        let config = RetryConfig::new().initial_delay(Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(400));
    }

    #[test]
    fn delay_is_capped() {
        let config = RetryConfig::new()
            .initial_delay(Duration::from_secs(10))
            .max_delay(Duration::from_secs(15));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(15));
    }

    #[test]
    fn defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(RetryConfig::disabled().max_attempts, 1);
    }
}
