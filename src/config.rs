//! Configuration loading for the `cryptarch` CLI.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.cryptarch/config.toml` (user)
//! 3. `/etc/cryptarch/config.toml` (system)
//!
//! If none exists, defaults apply. The session cookie is never read from
//! a file; the CLI takes it from `CRYPTARCH_SESSION`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::builder::CryptarchBuilder;
use crate::gateway::{DEFAULT_CACHE_CAPACITY, RateLimitConfig, TtlConfig};
use crate::manifest::TierConfig;
use crate::transport::RetryConfig;
use crate::{Cryptarch, CryptarchError, Result};

/// Client configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub ttl: TtlSettings,
    #[serde(default)]
    pub manifest: ManifestConfig,
}

/// Where the proxy lives.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    /// Proxy origin. May be overridden by `CRYPTARCH_BASE_URL`.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Per-attempt HTTP timeout in seconds (default: 30).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

/// Outbound limits.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Requests admitted per second (default: 8).
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: usize,
    /// Maximum cached responses (default: 10000).
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_requests_per_second(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

fn default_requests_per_second() -> usize {
    8
}

fn default_cache_capacity() -> u64 {
    DEFAULT_CACHE_CAPACITY
}

/// Transport retry policy.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

/// Cache freshness windows in seconds. Unset fields keep the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TtlSettings {
    #[serde(default)]
    pub default_secs: Option<u64>,
    #[serde(default)]
    pub milestones_secs: Option<u64>,
    #[serde(default)]
    pub news_secs: Option<u64>,
    #[serde(default)]
    pub manifest_secs: Option<u64>,
}

/// Table lists per tier. Unset lists keep the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ManifestConfig {
    #[serde(default)]
    pub essential: Option<Vec<String>>,
    #[serde(default)]
    pub analysis: Option<Vec<String>>,
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// An explicit path must exist. Without one, the first of
    /// `~/.cryptarch/config.toml` and `/etc/cryptarch/config.toml` that
    /// exists is used, else the defaults.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CryptarchError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            CryptarchError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(CryptarchError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".cryptarch").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        let system_config = PathBuf::from("/etc/cryptarch/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    /// Replace the configured base URL when `base_url` is set.
    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        if let Some(url) = base_url.filter(|u| !u.trim().is_empty()) {
            self.proxy.base_url = Some(url);
        }
        self
    }

    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig::new().max_requests(self.limits.requests_per_second)
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig::new()
            .max_attempts(self.retry.max_attempts)
            .initial_delay(Duration::from_millis(self.retry.initial_delay_ms))
            .max_delay(Duration::from_millis(self.retry.max_delay_ms))
    }

    pub fn ttl(&self) -> TtlConfig {
        let mut ttl = TtlConfig::default();
        if let Some(secs) = self.ttl.default_secs {
            ttl = ttl.default_ttl(Duration::from_secs(secs));
        }
        if let Some(secs) = self.ttl.milestones_secs {
            ttl = ttl.milestones(Duration::from_secs(secs));
        }
        if let Some(secs) = self.ttl.news_secs {
            ttl = ttl.news(Duration::from_secs(secs));
        }
        if let Some(secs) = self.ttl.manifest_secs {
            ttl = ttl.manifest(Duration::from_secs(secs));
        }
        ttl
    }

    pub fn tiers(&self) -> TierConfig {
        let mut tiers = TierConfig::default();
        if let Some(tables) = &self.manifest.essential {
            tiers = tiers.essential(tables.iter().cloned());
        }
        if let Some(tables) = &self.manifest.analysis {
            tiers = tiers.analysis(tables.iter().cloned());
        }
        tiers
    }

    /// A builder carrying every setting in this file.
    ///
    /// Fails if no base URL is configured.
    pub fn to_builder(&self) -> Result<CryptarchBuilder> {
        let base_url = self.proxy.base_url.clone().ok_or_else(|| {
            CryptarchError::Configuration(
                "No proxy base URL. Set [proxy] base_url or CRYPTARCH_BASE_URL".to_string(),
            )
        })?;
        Ok(Cryptarch::builder()
            .base_url(base_url)
            .timeout(Duration::from_secs(self.proxy.timeout_secs))
            .rate_limit(self.rate_limit())
            .retry(self.retry())
            .ttl(self.ttl())
            .cache_capacity(self.limits.cache_capacity)
            .tiers(self.tiers()))
    }
}
