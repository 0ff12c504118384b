//! Tests for metrics integration.
//!
//! Uses `metrics_util::debugging::DebuggingRecorder` to capture and assert
//! on emitted metrics without needing a real exporter. The recorder is
//! thread-local, so only metrics emitted on the calling task are seen;
//! work the gateway spawns for in-flight requests runs elsewhere.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};

use cryptarch::manifest::tier::ITEM_DEFINITIONS;
use cryptarch::telemetry;
use cryptarch::{
    CryptarchError, GatewayConfig, ItemCategory, RawRequest, RawResponse, ReferenceDataStore,
    RequestGateway, RequestOptions, Result, RetryConfig, StoreConfig, Transport,
    fetch_with_retry,
};

// ============================================================================
// Mock transports
// ============================================================================

struct SlowTransport {
    latency: Duration,
}

#[async_trait]
impl Transport for SlowTransport {
    async fn send(&self, request: &RawRequest) -> Result<RawResponse> {
        tokio::time::sleep(self.latency).await;
        if request.url.contains(ITEM_DEFINITIONS) {
            return Ok(RawResponse::new(
                200,
                r#"{"1": {"itemType": 3}, "2": {"itemType": 2}}"#,
            ));
        }
        Ok(RawResponse::new(200, "{}"))
    }
}

struct FlakyTransport {
    failures: AtomicU32,
}

#[async_trait]
impl Transport for FlakyTransport {
    async fn send(&self, _request: &RawRequest) -> Result<RawResponse> {
        if self.failures.load(Ordering::SeqCst) > 0 {
            self.failures.fetch_sub(1, Ordering::SeqCst);
            return Err(CryptarchError::Transport("connection reset".into()));
        }
        Ok(RawResponse::new(200, "{}"))
    }
}

// ============================================================================
// Snapshot type alias for readability
// ============================================================================

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

// ============================================================================
// Helpers
// ============================================================================

/// Sum all counter values matching a given metric name.
fn counter_total(snapshot: &SnapshotVec, name: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

fn gateway(latency: Duration) -> RequestGateway {
    RequestGateway::new(
        Arc::new(SlowTransport { latency }),
        GatewayConfig::new("http://proxy.test"),
    )
    .unwrap()
}

// ============================================================================
// Tests
// ============================================================================

/// Runs async code within a local recorder scope on the multi-thread runtime.
///
/// `block_in_place` ensures the sync `with_local_recorder` closure stays
/// on the current thread while `block_on` drives the inner async work.
#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn cache_hit_and_miss_are_counted() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let gateway = gateway(Duration::ZERO);
                gateway.milestones().await.unwrap();
                gateway.milestones().await.unwrap();
                gateway.milestones().await.unwrap();
            })
        })
    });

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_MISSES_TOTAL), 1);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_HITS_TOTAL), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn uncacheable_calls_are_neither_hit_nor_miss() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let gateway = gateway(Duration::ZERO);
                let options = RequestOptions::get().no_cache(true);
                gateway.request("/api/destiny/profile", &options).await.unwrap();
            })
        })
    });

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_MISSES_TOTAL), 0);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_HITS_TOTAL), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn coalesced_joins_are_counted() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let gateway = gateway(Duration::from_millis(50));
                let results = join_all((0..4).map(|_| gateway.profile())).await;
                assert!(results.iter().all(|r| r.is_ok()));
            })
        })
    });

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(counter_total(&snapshot, telemetry::COALESCED_TOTAL), 3);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_MISSES_TOTAL), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn retries_are_counted() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let result = metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let transport = FlakyTransport {
                    failures: AtomicU32::new(2),
                };
                let config = RetryConfig::new().initial_delay(Duration::from_millis(1));
                fetch_with_retry(
                    &transport,
                    &RawRequest::get("http://proxy.test/api/destiny/news"),
                    &config,
                )
                .await
            })
        })
    });
    assert!(result.is_ok());

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(counter_total(&snapshot, telemetry::RETRIES_TOTAL), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn chunk_scans_are_counted() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let store = ReferenceDataStore::new(
                    Arc::new(SlowTransport {
                        latency: Duration::ZERO,
                    }),
                    StoreConfig::new("http://proxy.test"),
                );
                store.item_chunk(ItemCategory::Weapons).await.unwrap();
                store.item_chunk(ItemCategory::Weapons).await.unwrap();
                store.item_chunk(ItemCategory::Armor).await.unwrap();
            })
        })
    });

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(counter_total(&snapshot, telemetry::CHUNK_SCANS_TOTAL), 2);
}

#[tokio::test]
async fn metrics_are_noop_without_recorder() {
    // Verify no panics when no recorder is installed.
    let gateway = gateway(Duration::ZERO);
    gateway.milestones().await.unwrap();
    gateway.milestones().await.unwrap();
}
