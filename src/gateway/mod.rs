//! Request gateway: the single path from application code to the proxy.
//!
//! Every call goes through [`RequestGateway::request`], which layers three
//! mechanisms over the shared [`fetch_with_retry`] primitive:
//!
//! 1. **Response cache**: cacheable reads (`GET` without `no_cache`)
//!    return a stored payload when it is younger than the call's TTL. A
//!    hit touches neither the network nor the rate limiter.
//! 2. **Request coalescing**: at most one request is in flight per cache
//!    key. Concurrent identical calls, writes included, join it and
//!    receive the same payload or the same error. A joined call is not
//!    counted against the rate limiter.
//! 3. **Rate window**: each dispatched request first acquires a slot in
//!    the sliding [`RateWindow`].
//!
//! On success a cacheable response is stored before the in-flight entry
//! is released; the entry is released whether the request succeeded or
//! not.

pub mod cache;
pub mod endpoints;
pub mod rate_limit;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;

use crate::coalesce::{Flight, InFlight};
use crate::telemetry;
use crate::transport::{Method, RawRequest, RetryConfig, Transport, fetch_with_retry};
use crate::{CryptarchError, Result};

pub use cache::{CacheEntry, CacheStats, DEFAULT_CACHE_CAPACITY, cache_key, canonical_json};
pub use endpoints::{EquipRequest, SessionStatus, TransferRequest, TtlConfig, UserProfile};
pub use rate_limit::{RateLimitConfig, RateWindow};

use cache::ResponseCache;

/// Per-call options for [`RequestGateway::request`].
///
/// ```rust
/// # use cryptarch::RequestOptions;
/// # use std::time::Duration;
/// let options = RequestOptions::get()
///     .query("page", "2")
///     .cache_ttl(Duration::from_secs(900));
/// assert!(options.is_cacheable());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub method: Method,
    /// Query string parameters, kept sorted so they serialise stably.
    pub query: BTreeMap<String, String>,
    /// JSON body for writes.
    pub body: Option<Value>,
    /// Bypass the response cache entirely (no read, no write).
    pub no_cache: bool,
    /// Freshness window for this call. `None` uses the gateway default.
    pub cache_ttl: Option<Duration>,
}

impl RequestOptions {
    /// A cacheable `GET`.
    pub fn get() -> Self {
        Self::default()
    }

    /// A `POST` carrying `body`. Writes never touch the cache.
    pub fn post(body: Value) -> Self {
        Self {
            method: Method::Post,
            body: Some(body),
            no_cache: true,
            ..Self::default()
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn no_cache(mut self, no_cache: bool) -> Self {
        self.no_cache = no_cache;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Only reads that have not opted out are served from or stored in
    /// the cache.
    pub fn is_cacheable(&self) -> bool {
        !self.no_cache && self.method.is_read()
    }
}

/// Settings for a [`RequestGateway`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Proxy origin, e.g. `https://example.com`. Endpoints are appended.
    pub base_url: String,
    pub rate_limit: RateLimitConfig,
    pub retry: RetryConfig,
    pub ttl: TtlConfig,
    /// Maximum number of cached responses.
    pub cache_capacity: u64,
}

impl GatewayConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            rate_limit: RateLimitConfig::default(),
            retry: RetryConfig::default(),
            ttl: TtlConfig::default(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// Caching, coalescing, rate-limited client for the proxy.
///
/// Construct one per session and share it (`Arc<RequestGateway>`).
pub struct RequestGateway {
    transport: Arc<dyn Transport>,
    base_url: String,
    retry: RetryConfig,
    ttl: TtlConfig,
    limiter: Arc<RateWindow>,
    cache: Arc<ResponseCache>,
    in_flight: InFlight<Arc<Value>>,
}

impl RequestGateway {
    /// Build a gateway over `transport`.
    ///
    /// Fails if the rate limit configuration can never admit a request.
    pub fn new(transport: Arc<dyn Transport>, config: GatewayConfig) -> Result<Self> {
        Ok(Self {
            transport,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            retry: config.retry,
            ttl: config.ttl,
            limiter: Arc::new(RateWindow::new(&config.rate_limit)?),
            cache: Arc::new(ResponseCache::new(config.cache_capacity)),
            in_flight: InFlight::new(),
        })
    }

    /// Issue a call to `endpoint` (a path such as `/api/destiny/news`).
    ///
    /// Returns the decoded JSON body. Non-success statuses surface as
    /// [`CryptarchError::Http`] with the status and body preserved; they
    /// are never retried or cached.
    pub async fn request(&self, endpoint: &str, options: &RequestOptions) -> Result<Arc<Value>> {
        let key = cache_key(endpoint, options);
        let cacheable = options.is_cacheable();

        if cacheable {
            let ttl = options.cache_ttl.unwrap_or(self.ttl.default);
            if let Some(payload) = self.cache.get_fresh(&key, ttl) {
                debug!(endpoint, "cache hit");
                metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
                return Ok(payload);
            }
            metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
        }

        let request = RawRequest {
            method: options.method,
            url: self.url(endpoint, &options.query)?,
            body: options.body.clone(),
        };

        // A cacheable caller must not join a flight that will not store.
        let flight_key = if cacheable {
            key.clone()
        } else {
            format!("{key}#uncached")
        };
        let (result, flight) = self.in_flight.join_or_start(&flight_key, || {
            dispatch(
                Arc::clone(&self.transport),
                Arc::clone(&self.limiter),
                self.retry.clone(),
                cacheable.then(|| (Arc::clone(&self.cache), key.clone())),
                request,
            )
        });
        if flight == Flight::Joined {
            debug!(endpoint, "joined in-flight request");
            metrics::counter!(telemetry::COALESCED_TOTAL).increment(1);
        }

        result.await
    }

    /// Drop every cached response. In-flight requests are unaffected and
    /// store their result when they complete.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Drop cached responses whose key starts with `prefix`. Keys start
    /// with the endpoint path, so an endpoint works as a prefix.
    pub fn clear_cache_entry(&self, prefix: &str) -> usize {
        self.cache.clear_prefix(prefix)
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            entries: self.cache.len(),
            pending: self.in_flight.len(),
            keys: self.cache.keys(),
        }
    }

    /// TTL defaults used by the endpoint wrappers.
    pub fn ttl(&self) -> &TtlConfig {
        &self.ttl
    }

    fn url(&self, endpoint: &str, query: &BTreeMap<String, String>) -> Result<String> {
        let raw = if endpoint.starts_with('/') {
            format!("{}{endpoint}", self.base_url)
        } else {
            format!("{}/{endpoint}", self.base_url)
        };
        if query.is_empty() {
            return Ok(raw);
        }
        let url = reqwest::Url::parse_with_params(&raw, query.iter()).map_err(|e| {
            CryptarchError::Configuration(format!("invalid request URL {raw}: {e}"))
        })?;
        Ok(url.into())
    }
}

/// The work behind one in-flight entry: rate limit, fetch, decode, store.
async fn dispatch(
    transport: Arc<dyn Transport>,
    limiter: Arc<RateWindow>,
    retry: RetryConfig,
    store: Option<(Arc<ResponseCache>, String)>,
    request: RawRequest,
) -> Result<Arc<Value>> {
    let started = Instant::now();
    limiter.acquire().await;

    let result = async {
        let response = fetch_with_retry(transport.as_ref(), &request, &retry)
            .await?
            .error_for_status()?;
        Ok::<_, CryptarchError>(Arc::new(response.json()?))
    }
    .await;

    metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS)
        .record(started.elapsed().as_secs_f64());
    match &result {
        Ok(payload) => {
            metrics::counter!(telemetry::REQUESTS_TOTAL, "status" => "ok").increment(1);
            if let Some((cache, key)) = store {
                cache.insert(key, Arc::clone(payload));
            }
        }
        Err(e) => {
            metrics::counter!(telemetry::REQUESTS_TOTAL, "status" => "error").increment(1);
            debug!(url = %request.url, error = %e, "request failed");
        }
    }
    result
}
