//! Response cache for proxied reads.
//!
//! Entries record when they were stored; freshness is judged at read time
//! against the TTL the *caller* supplies, so one entry may be fresh for a
//! call asking for an hour and stale for one asking for a minute. Stale
//! entries are never evicted on their own account. They are ignored and
//! overwritten by the next successful fetch.
//!
//! Storage is moka's in-memory cache, bounded by entry count so a
//! long-lived session cannot grow without limit. Timestamps use
//! `tokio::time::Instant` so paused-clock tests control freshness.

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use serde_json::{Map, Value};
use tokio::time::Instant;

use super::RequestOptions;

/// Default maximum number of cached responses.
pub const DEFAULT_CACHE_CAPACITY: u64 = 10_000;

/// A cached response payload and the moment it was stored.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub payload: Arc<Value>,
    pub stored_at: Instant,
}

impl CacheEntry {
    /// `now - stored_at < ttl`.
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() < ttl
    }
}

/// Snapshot of gateway cache state for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries currently stored, fresh or stale.
    pub entries: u64,
    /// Requests currently in flight.
    pub pending: usize,
    /// Keys of stored entries, sorted.
    pub keys: Vec<String>,
}

pub(crate) struct ResponseCache {
    entries: Cache<String, CacheEntry>,
}

impl ResponseCache {
    pub(crate) fn new(max_entries: u64) -> Self {
        Self {
            entries: Cache::new(max_entries),
        }
    }

    /// Payload for `key` if it was stored less than `ttl` ago.
    pub(crate) fn get_fresh(&self, key: &str, ttl: Duration) -> Option<Arc<Value>> {
        self.entries
            .get(key)
            .filter(|entry| entry.is_fresh(ttl))
            .map(|entry| entry.payload)
    }

    pub(crate) fn insert(&self, key: String, payload: Arc<Value>) {
        self.entries.insert(
            key,
            CacheEntry {
                payload,
                stored_at: Instant::now(),
            },
        );
    }

    pub(crate) fn clear(&self) {
        self.entries.invalidate_all();
        self.entries.run_pending_tasks();
    }

    /// Drop every entry whose key starts with `prefix`. Returns how many
    /// were dropped.
    pub(crate) fn clear_prefix(&self, prefix: &str) -> usize {
        let doomed: Vec<Arc<String>> = self
            .entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key)
            .collect();
        for key in &doomed {
            self.entries.invalidate(key.as_str());
        }
        self.entries.run_pending_tasks();
        doomed.len()
    }

    pub(crate) fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .map(|(key, _)| key.as_ref().clone())
            .collect();
        keys.sort();
        keys
    }

    pub(crate) fn len(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }
}

/// Derive the cache key for a call: the endpoint followed by the
/// canonical JSON of the options that identify the request (method,
/// query, body). Cache-control options are not part of the identity.
pub fn cache_key(endpoint: &str, options: &RequestOptions) -> String {
    let mut identity = Map::new();
    identity.insert("method".into(), Value::String(options.method.as_str().into()));
    if !options.query.is_empty() {
        let query = options
            .query
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        identity.insert("query".into(), Value::Object(query));
    }
    if let Some(body) = &options.body {
        identity.insert("body".into(), body.clone());
    }
    format!("{endpoint}{}", canonical_json(&Value::Object(identity)))
}

/// Serialise `value` with object keys sorted at every depth.
///
/// Does not rely on serde_json's map ordering, which flips to insertion
/// order when any crate in the build enables `preserve_order`.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
