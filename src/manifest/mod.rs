//! Reference data store: tiered, deduplicated loading of manifest tables.
//!
//! # Tiers
//!
//! Tables are grouped into an essential tier (a handful of small tables
//! the UI needs immediately) and an analysis tier (the large item, perk
//! and plug set catalogues). Within a tier every table is fetched
//! concurrently and the tier completes at the join of all of them. The
//! analysis tier always waits for the essential tier to settle first.
//!
//! # Failure policy
//!
//! - A table that exhausts its retries is replaced by an empty table in
//!   the tier result and is not made resident.
//! - If *every* essential table fails, [`load_essentials`](ReferenceDataStore::load_essentials)
//!   returns [`CryptarchError::DataUnavailable`].
//! - [`load_analysis_data`](ReferenceDataStore::load_analysis_data) never
//!   fails; callers must treat empty analysis tables as a normal state.
//! - A tier result with failed tables is returned but not memoised, so
//!   the next call refetches only what failed.
//!
//! # Deduplication
//!
//! Fetches are keyed by table name: a caller asking for a table that is
//! already being fetched awaits the same in-flight fetch. Loaded tables
//! stay resident until [`clear_cache`](ReferenceDataStore::clear_cache).

pub mod chunk;
pub mod definition;
pub mod tier;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures_util::future::join_all;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::coalesce::{Flight, InFlight};
use crate::gateway::endpoints::MANIFEST_DEFINITION;
use crate::telemetry;
use crate::transport::{RawRequest, RetryConfig, Transport, fetch_with_retry};
use crate::{CryptarchError, Result};

pub use chunk::{ItemCategory, ItemChunk};
pub use definition::{Definition, DefinitionTable, DisplayProperties, parse_table};
pub use tier::{AnalysisData, EssentialData, LoadTier, TierConfig, TierTables};

type Tables = Arc<RwLock<HashMap<String, Arc<DefinitionTable>>>>;

/// Settings for a [`ReferenceDataStore`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Proxy origin; tables are read from `{base_url}/api/manifest/definition`.
    pub base_url: String,
    pub retry: RetryConfig,
    pub tiers: TierConfig,
}

impl StoreConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            retry: RetryConfig::default(),
            tiers: TierConfig::default(),
        }
    }
}

/// Snapshot of store state for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    /// Names of loaded tables, sorted.
    pub resident_tables: Vec<String>,
    /// Categories with a computed chunk, sorted.
    pub chunks: Vec<ItemCategory>,
    /// Full item-table scans performed since construction.
    pub chunk_scans: u64,
    pub essentials_ready: bool,
    pub analysis_ready: bool,
}

/// Session-lifetime cache of manifest tables.
///
/// Construct one per session and share it (`Arc<ReferenceDataStore>`).
pub struct ReferenceDataStore {
    transport: Arc<dyn Transport>,
    base_url: String,
    retry: RetryConfig,
    tiers: TierConfig,
    tables: Tables,
    in_flight: InFlight<Arc<DefinitionTable>>,
    essentials: RwLock<Option<Arc<EssentialData>>>,
    analysis: RwLock<Option<Arc<AnalysisData>>>,
    chunks: RwLock<HashMap<ItemCategory, Arc<ItemChunk>>>,
    essential_gate: Mutex<()>,
    analysis_gate: Mutex<()>,
    chunk_gate: Mutex<()>,
    /// Bumped by `clear_cache`; work started under an older epoch does not
    /// write its results back.
    epoch: Arc<AtomicU64>,
    chunk_scans: AtomicU64,
}

impl ReferenceDataStore {
    pub fn new(transport: Arc<dyn Transport>, config: StoreConfig) -> Self {
        Self {
            transport,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            retry: config.retry,
            tiers: config.tiers,
            tables: Arc::new(RwLock::new(HashMap::new())),
            in_flight: InFlight::new(),
            essentials: RwLock::new(None),
            analysis: RwLock::new(None),
            chunks: RwLock::new(HashMap::new()),
            essential_gate: Mutex::new(()),
            analysis_gate: Mutex::new(()),
            chunk_gate: Mutex::new(()),
            epoch: Arc::new(AtomicU64::new(0)),
            chunk_scans: AtomicU64::new(0),
        }
    }

    /// Load (or return the memoised) essential tier.
    ///
    /// Individual table failures yield empty tables. Fails with
    /// [`CryptarchError::DataUnavailable`] only if every table failed.
    pub async fn load_essentials(&self) -> Result<Arc<EssentialData>> {
        let _gate = self.essential_gate.lock().await;
        if let Some(data) = read(&self.essentials).clone() {
            return Ok(data);
        }

        let epoch = self.epoch.load(Ordering::SeqCst);
        let expected = self.tiers.essential.len();
        let (tables, first_error) = self.load_tier(LoadTier::Essential).await;

        if expected > 0 && tables.failed().len() == expected {
            let cause = first_error.map(|e| e.to_string()).unwrap_or_default();
            warn!(tables = expected, error = %cause, "essential tier failed entirely");
            return Err(CryptarchError::DataUnavailable(format!(
                "all {expected} essential tables failed to load: {cause}"
            )));
        }

        let data = Arc::new(EssentialData { tables });
        info!(
            tables = data.tables.len(),
            failed = data.tables.failed().len(),
            "essential tier ready"
        );
        if data.tables.is_complete() && self.epoch.load(Ordering::SeqCst) == epoch {
            *write(&self.essentials) = Some(Arc::clone(&data));
        }
        Ok(data)
    }

    /// Load (or return the memoised) analysis tier. Never fails.
    ///
    /// On a cold load, waits for the essential tier to settle first,
    /// whatever its outcome. A memoised tier is returned without touching
    /// the essential tier.
    pub async fn load_analysis_data(&self) -> Arc<AnalysisData> {
        if let Some(data) = read(&self.analysis).clone() {
            return data;
        }

        if let Err(e) = self.load_essentials().await {
            warn!(error = %e, "essential tier unavailable, loading analysis tier anyway");
        }

        let _gate = self.analysis_gate.lock().await;
        if let Some(data) = read(&self.analysis).clone() {
            return data;
        }

        let epoch = self.epoch.load(Ordering::SeqCst);
        let (tables, _) = self.load_tier(LoadTier::Analysis).await;
        let data = Arc::new(AnalysisData { tables });
        if data.tables.is_complete() {
            info!(tables = data.tables.len(), "analysis tier ready");
            if self.epoch.load(Ordering::SeqCst) == epoch {
                *write(&self.analysis) = Some(Arc::clone(&data));
            }
        } else {
            warn!(
                failed = ?data.tables.failed(),
                "analysis tier degraded, continuing with empty tables"
            );
        }
        data
    }

    /// Start loading the analysis tier in the background.
    pub fn preload_analysis(self: &Arc<Self>) -> JoinHandle<Arc<AnalysisData>> {
        let store = Arc::clone(self);
        tokio::spawn(async move { store.load_analysis_data().await })
    }

    /// The chunk for a category given by name (`"weapons"`, `"armor"`,
    /// `"consumables"`, `"cosmetics"`).
    pub async fn load_item_chunk(&self, category: &str) -> Result<Arc<ItemChunk>> {
        let category: ItemCategory = category.parse()?;
        self.item_chunk(category).await
    }

    /// The chunk for `category`, derived from the full item table on first
    /// request and memoised for the session.
    ///
    /// Loads the item table if it is not resident; a failure to load it is
    /// returned as-is.
    pub async fn item_chunk(&self, category: ItemCategory) -> Result<Arc<ItemChunk>> {
        if let Some(chunk) = read(&self.chunks).get(&category).cloned() {
            return Ok(chunk);
        }

        let _gate = self.chunk_gate.lock().await;
        if let Some(chunk) = read(&self.chunks).get(&category).cloned() {
            return Ok(chunk);
        }

        let epoch = self.epoch.load(Ordering::SeqCst);
        let items = self.load_table(tier::ITEM_DEFINITIONS).await?;
        let chunk = tokio::task::spawn_blocking(move || ItemChunk::derive(category, &items))
            .await
            .map_err(|e| CryptarchError::Decode(format!("chunk derivation failed: {e}")))?;
        let chunk = Arc::new(chunk);

        self.chunk_scans.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(telemetry::CHUNK_SCANS_TOTAL, "category" => category.as_str())
            .increment(1);
        debug!(%category, entries = chunk.len(), "item chunk derived");

        if self.epoch.load(Ordering::SeqCst) == epoch {
            write(&self.chunks).insert(category, Arc::clone(&chunk));
        }
        Ok(chunk)
    }

    /// O(1) lookup in a resident table. `None` if the table is not loaded
    /// or has no such hash; this never triggers a load.
    pub fn get_definition(&self, table: &str, hash: u32) -> Option<Arc<Definition>> {
        read(&self.tables)
            .get(table)
            .and_then(|t| t.get(hash))
            .cloned()
    }

    /// A resident table by name.
    pub fn table(&self, name: &str) -> Option<Arc<DefinitionTable>> {
        read(&self.tables).get(name).cloned()
    }

    /// Load one table, joining an in-flight fetch for the same name.
    pub async fn load_table(&self, name: &str) -> Result<Arc<DefinitionTable>> {
        if let Some(table) = self.table(name) {
            return Ok(table);
        }

        let request = RawRequest::get(self.table_url(name)?);
        let epoch = self.epoch.load(Ordering::SeqCst);
        let (result, flight) = self.in_flight.join_or_start(name, || {
            fetch_table(
                Arc::clone(&self.transport),
                request,
                self.retry.clone(),
                name.to_owned(),
                Arc::clone(&self.tables),
                Arc::clone(&self.epoch),
                epoch,
            )
        });
        if flight == Flight::Joined {
            debug!(table = name, "joined in-flight table fetch");
            metrics::counter!(telemetry::COALESCED_TOTAL).increment(1);
        }
        result.await
    }

    /// Drop every table, tier and chunk. The next call is a cold start;
    /// fetches already running finish but their results are discarded.
    pub fn clear_cache(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.in_flight.clear();
        write(&self.tables).clear();
        *write(&self.essentials) = None;
        *write(&self.analysis) = None;
        write(&self.chunks).clear();
        info!("reference data cache cleared");
    }

    pub fn stats(&self) -> StoreStats {
        let mut resident_tables: Vec<String> = read(&self.tables).keys().cloned().collect();
        resident_tables.sort();
        let mut chunks: Vec<ItemCategory> = read(&self.chunks).keys().copied().collect();
        chunks.sort();
        StoreStats {
            resident_tables,
            chunks,
            chunk_scans: self.chunk_scans.load(Ordering::Relaxed),
            essentials_ready: read(&self.essentials).is_some(),
            analysis_ready: read(&self.analysis).is_some(),
        }
    }

    /// Fetch every table of `tier` concurrently. Failed tables come back
    /// empty and listed in [`TierTables::failed`], alongside the first
    /// error seen.
    async fn load_tier(&self, tier: LoadTier) -> (TierTables, Option<CryptarchError>) {
        let names = self.tiers.tables(tier);
        debug!(%tier, tables = names.len(), "loading tier");
        let results = join_all(
            names
                .iter()
                .map(|name| async move { (name, self.load_table(name).await) }),
        )
        .await;

        let mut tables = HashMap::with_capacity(results.len());
        let mut failed = Vec::new();
        let mut first_error = None;
        for (name, result) in results {
            match result {
                Ok(table) => {
                    tables.insert(name.clone(), table);
                }
                Err(e) => {
                    warn!(%tier, table = %name, error = %e, "table unavailable, using empty table");
                    tables.insert(name.clone(), Arc::new(DefinitionTable::empty(name.as_str())));
                    failed.push(name.clone());
                    first_error.get_or_insert(e);
                }
            }
        }
        (TierTables::new(tables, failed), first_error)
    }

    fn table_url(&self, name: &str) -> Result<String> {
        let raw = format!("{}{MANIFEST_DEFINITION}", self.base_url);
        let url = reqwest::Url::parse_with_params(&raw, &[("tableName", name)]).map_err(|e| {
            CryptarchError::Configuration(format!("invalid manifest URL {raw}: {e}"))
        })?;
        Ok(url.into())
    }
}

/// Fetch, parse and (epoch permitting) make resident one table.
async fn fetch_table(
    transport: Arc<dyn Transport>,
    request: RawRequest,
    retry: RetryConfig,
    name: String,
    tables: Tables,
    epoch_counter: Arc<AtomicU64>,
    epoch: u64,
) -> Result<Arc<DefinitionTable>> {
    let result = async {
        let response = fetch_with_retry(transport.as_ref(), &request, &retry)
            .await?
            .error_for_status()?;
        let table_name = name.clone();
        // Analysis tables run to tens of megabytes; keep parsing off the
        // async workers.
        tokio::task::spawn_blocking(move || parse_table(&table_name, &response.body))
            .await
            .map_err(|e| CryptarchError::Decode(format!("table parse task failed: {e}")))?
    }
    .await;

    match result {
        Ok(table) => {
            metrics::counter!(telemetry::TABLE_LOADS_TOTAL,
                "table" => name.clone(),
                "status" => "ok",
            )
            .increment(1);
            debug!(table = %name, entries = table.len(), "definition table loaded");
            let table = Arc::new(table);
            if epoch_counter.load(Ordering::SeqCst) == epoch {
                write(&tables).insert(name, Arc::clone(&table));
            }
            Ok(table)
        }
        Err(e) => {
            metrics::counter!(telemetry::TABLE_LOADS_TOTAL,
                "table" => name.clone(),
                "status" => "error",
            )
            .increment(1);
            warn!(table = %name, error = %e, "definition table fetch failed");
            Err(e)
        }
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
