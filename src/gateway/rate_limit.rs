//! Sliding-window outbound rate limiter.
//!
//! [`RateWindow`] admits at most `max_requests` acquisitions within any
//! trailing `window`. Callers arriving while the window is saturated
//! sleep until the oldest timestamp leaves it, then re-evaluate from
//! scratch. Several callers parked behind the same saturation point wake
//! together; whichever re-locks first takes the freed slot and the rest
//! sleep again. Ordering beyond that convoy is not guaranteed, and under
//! sustained overload a caller can be starved.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::telemetry;
use crate::{CryptarchError, Result};

/// Rate limiter settings.
///
/// ```rust
/// # use cryptarch::RateLimitConfig;
/// let config = RateLimitConfig::new().max_requests(20);
/// assert_eq!(config.window.as_millis(), 1000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests admitted per window. Default: 8.
    pub max_requests: usize,
    /// Window length. Default: 1s.
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 8,
            window: Duration::from_millis(1000),
        }
    }
}

impl RateLimitConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_requests(mut self, n: usize) -> Self {
        self.max_requests = n;
        self
    }

    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }
}

/// Sliding window of admission timestamps.
pub struct RateWindow {
    max_requests: usize,
    window: Duration,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl RateWindow {
    /// Fails with [`CryptarchError::Configuration`] for a zero ceiling or
    /// an empty window, either of which would never admit anything.
    pub fn new(config: &RateLimitConfig) -> Result<Self> {
        if config.max_requests == 0 {
            return Err(CryptarchError::Configuration(
                "rate limit must admit at least one request".into(),
            ));
        }
        if config.window.is_zero() {
            return Err(CryptarchError::Configuration(
                "rate limit window must be non-zero".into(),
            ));
        }
        Ok(Self {
            max_requests: config.max_requests,
            window: config.window,
            timestamps: Mutex::new(VecDeque::with_capacity(config.max_requests)),
        })
    }

    /// Wait until a request may be dispatched, then record it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut timestamps = self
                    .timestamps
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                let now = Instant::now();
                prune(&mut timestamps, now, self.window);

                if timestamps.len() < self.max_requests {
                    timestamps.push_back(now);
                    return;
                }

                // Saturated: non-empty, so front() exists.
                match timestamps.front() {
                    Some(&oldest) => (oldest + self.window).saturating_duration_since(now),
                    None => Duration::ZERO,
                }
            };

            debug!(
                wait_ms = wait.as_millis() as u64,
                max_requests = self.max_requests,
                "rate window saturated, waiting"
            );
            metrics::counter!(telemetry::RATE_LIMIT_WAITS_TOTAL).increment(1);
            tokio::time::sleep(wait).await;
        }
    }

    /// Number of admissions inside the trailing window right now.
    pub fn in_window(&self) -> usize {
        let mut timestamps = self
            .timestamps
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        prune(&mut timestamps, Instant::now(), self.window);
        timestamps.len()
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }
}

/// Drop timestamps that have left the window.
fn prune(timestamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&oldest) = timestamps.front() {
        if now.duration_since(oldest) >= window {
            timestamps.pop_front();
        } else {
            break;
        }
    }
}
