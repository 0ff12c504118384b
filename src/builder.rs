//! Builder for a configured gateway and reference data store pair.

use std::sync::Arc;
use std::time::Duration;

use crate::gateway::{GatewayConfig, RateLimitConfig, RequestGateway, TtlConfig};
use crate::manifest::{ReferenceDataStore, StoreConfig, TierConfig};
use crate::transport::{HttpTransport, RetryConfig, Transport};
use crate::{CryptarchError, Result};

/// Main entry point for creating a [`CryptarchClient`].
pub struct Cryptarch;

impl Cryptarch {
    /// Create a new builder.
    pub fn builder() -> CryptarchBuilder {
        CryptarchBuilder::new()
    }
}

/// Builder for a [`CryptarchClient`].
///
/// Only the proxy base URL is required. Everything else has a default.
pub struct CryptarchBuilder {
    base_url: Option<String>,
    rate_limit: RateLimitConfig,
    retry: RetryConfig,
    ttl: TtlConfig,
    cache_capacity: u64,
    tiers: TierConfig,
    session_cookie: Option<String>,
    timeout: Option<Duration>,
    transport: Option<Arc<dyn Transport>>,
}

impl CryptarchBuilder {
    pub fn new() -> Self {
        Self {
            base_url: None,
            rate_limit: RateLimitConfig::default(),
            retry: RetryConfig::default(),
            ttl: TtlConfig::default(),
            cache_capacity: crate::gateway::DEFAULT_CACHE_CAPACITY,
            tiers: TierConfig::default(),
            session_cookie: None,
            timeout: None,
            transport: None,
        }
    }

    /// Proxy origin, e.g. `https://guardian.example`.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit = config;
        self
    }

    /// Retry policy shared by the gateway and the store.
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    pub fn ttl(mut self, config: TtlConfig) -> Self {
        self.ttl = config;
        self
    }

    /// Maximum number of cached responses.
    pub fn cache_capacity(mut self, capacity: u64) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn tiers(mut self, config: TierConfig) -> Self {
        self.tiers = config;
        self
    }

    /// Session cookie forwarded on every request (`name=value`).
    ///
    /// Ignored when a custom transport is supplied.
    pub fn session_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.session_cookie = Some(cookie.into());
        self
    }

    /// Per-attempt HTTP timeout. Ignored when a custom transport is supplied.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Use `transport` instead of building an [`HttpTransport`].
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the client.
    ///
    /// Fails if no base URL was set or the rate limit can never admit a
    /// request.
    pub fn build(self) -> Result<CryptarchClient> {
        let base_url = self
            .base_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| CryptarchError::Configuration("base_url is required".into()))?;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::build(
                self.session_cookie.as_deref(),
                self.timeout,
            )?),
        };

        let gateway = RequestGateway::new(
            Arc::clone(&transport),
            GatewayConfig {
                base_url: base_url.clone(),
                rate_limit: self.rate_limit,
                retry: self.retry.clone(),
                ttl: self.ttl,
                cache_capacity: self.cache_capacity,
            },
        )?;
        let store = ReferenceDataStore::new(
            transport,
            StoreConfig {
                base_url,
                retry: self.retry,
                tiers: self.tiers,
            },
        );

        Ok(CryptarchClient {
            gateway: Arc::new(gateway),
            store: Arc::new(store),
        })
    }
}

impl Default for CryptarchBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A gateway and a reference data store sharing one transport.
///
/// Cheap to clone; clones share all caches.
#[derive(Clone)]
pub struct CryptarchClient {
    gateway: Arc<RequestGateway>,
    store: Arc<ReferenceDataStore>,
}

impl CryptarchClient {
    pub fn gateway(&self) -> &Arc<RequestGateway> {
        &self.gateway
    }

    pub fn store(&self) -> &Arc<ReferenceDataStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_required() {
        let err = Cryptarch::builder().build().err().unwrap();
        assert!(matches!(err, CryptarchError::Configuration(_)));

        let err = Cryptarch::builder().base_url("  ").build().err().unwrap();
        assert!(matches!(err, CryptarchError::Configuration(_)));
    }

    #[test]
    fn zero_rate_limit_is_rejected() {
        let result = Cryptarch::builder()
            .base_url("http://localhost:3000")
            .rate_limit(RateLimitConfig::default().max_requests(0))
            .build();
        assert!(matches!(result, Err(CryptarchError::Configuration(_))));
    }

    #[test]
    fn builds_with_defaults() {
        let client = Cryptarch::builder()
            .base_url("http://localhost:3000/")
            .session_cookie("session=abc")
            .build()
            .unwrap();
        assert_eq!(client.gateway().cache_stats().entries, 0);
        assert!(client.store().stats().resident_tables.is_empty());
    }
}
