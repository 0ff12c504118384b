//! Cryptarch - client core for a Destiny 2 API proxy
//!
//! Two components share one [`Transport`] and one retry primitive
//! ([`fetch_with_retry`]):
//!
//! - [`RequestGateway`] is the path for every proxied API call. It layers a
//!   TTL response cache, per-key request coalescing and a sliding-window
//!   rate limiter over the transport.
//! - [`ReferenceDataStore`] loads manifest definition tables in two tiers
//!   (essential, then analysis), deduplicates concurrent table fetches and
//!   derives per-category item chunks on demand.
//!
//! # Example
//!
//! ```rust,no_run
//! use cryptarch::{Cryptarch, ItemCategory};
//!
//! #[tokio::main]
//! async fn main() -> cryptarch::Result<()> {
//!     let client = Cryptarch::builder()
//!         .base_url("https://guardian.example")
//!         .session_cookie("session=...")
//!         .build()?;
//!
//!     // Small tables first; the UI can render once these are in.
//!     let essentials = client.store().load_essentials().await?;
//!     println!("{} stat definitions", essentials.stats().len());
//!
//!     // Large tables in the background.
//!     let analysis = client.store().preload_analysis();
//!
//!     let milestones = client.gateway().milestones().await?;
//!     println!("{milestones}");
//!
//!     let weapons = client.store().item_chunk(ItemCategory::Weapons).await?;
//!     println!("{} weapons", weapons.len());
//!
//!     let _ = analysis.await;
//!     Ok(())
//! }
//! ```

pub mod builder;
mod coalesce;
#[cfg(feature = "cli")]
pub mod config;
pub mod error;
pub mod gateway;
pub mod manifest;
pub mod telemetry;
pub mod transport;

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

pub use builder::{Cryptarch, CryptarchBuilder, CryptarchClient};
pub use error::{CryptarchError, Result};
pub use gateway::{
    CacheStats, GatewayConfig, RateLimitConfig, RateWindow, RequestGateway, RequestOptions,
    TtlConfig,
};
pub use manifest::{
    AnalysisData, Definition, DefinitionTable, EssentialData, ItemCategory, ItemChunk, LoadTier,
    ReferenceDataStore, StoreConfig, StoreStats, TierConfig,
};
pub use transport::{
    HttpTransport, Method, RawRequest, RawResponse, RetryConfig, Transport, fetch_with_retry,
};
