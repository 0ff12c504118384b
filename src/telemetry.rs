//! Telemetry metric name constants.
//!
//! Consumers install their own `metrics` recorder (e.g. prometheus,
//! statsd); without a recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `cryptarch_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `status`: "ok" or "error"
//! - `table`: manifest table name

/// Total requests dispatched to the proxy (cache hits and coalesced
/// joins excluded).
///
/// Labels: `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "cryptarch_requests_total";

/// Dispatched request duration in seconds, rate-limit wait included.
pub const REQUEST_DURATION_SECONDS: &str = "cryptarch_request_duration_seconds";

/// Total response-cache hits.
pub const CACHE_HITS_TOTAL: &str = "cryptarch_cache_hits_total";

/// Total response-cache misses (cacheable calls only).
pub const CACHE_MISSES_TOTAL: &str = "cryptarch_cache_misses_total";

/// Total callers that joined an already in-flight request.
pub const COALESCED_TOTAL: &str = "cryptarch_coalesced_total";

/// Total times a caller was suspended by the rate window.
pub const RATE_LIMIT_WAITS_TOTAL: &str = "cryptarch_rate_limit_waits_total";

/// Total retry attempts after a transport failure (not counting the
/// initial attempt).
pub const RETRIES_TOTAL: &str = "cryptarch_retries_total";

/// Total manifest table fetches.
///
/// Labels: `table`, `status` ("ok" | "error").
pub const TABLE_LOADS_TOTAL: &str = "cryptarch_table_loads_total";

/// Total full item-table scans performed to derive chunks.
///
/// Labels: `category`.
pub const CHUNK_SCANS_TOTAL: &str = "cryptarch_chunk_scans_total";
