//! Convenience wrappers per proxy endpoint family.
//!
//! Reads carry the TTL their data volatility calls for (see
//! [`TtlConfig`]); writes are `POST`s that bypass the cache but are still
//! rate limited and coalesced, so an accidental double-submit of the same
//! transfer reaches the proxy once.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{RequestGateway, RequestOptions};
use crate::Result;

pub const SESSION: &str = "/api/auth/session";
pub const PROFILE: &str = "/api/destiny/profile";
pub const ACTIVITIES: &str = "/api/destiny/activities";
pub const STATS: &str = "/api/destiny/stats";
pub const VENDORS: &str = "/api/destiny/vendors";
pub const MILESTONES: &str = "/api/destiny/milestones";
pub const NEWS: &str = "/api/destiny/news";
pub const MANIFEST_DEFINITION: &str = "/api/manifest/definition";
pub const TRANSFER: &str = "/api/inventory/transfer";
pub const EQUIP: &str = "/api/inventory/equip";

/// Freshness windows per endpoint family.
///
/// These are product defaults, not invariants; any single call can still
/// override them via [`RequestOptions::cache_ttl`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtlConfig {
    /// Reads without a more specific setting. Default: 5 minutes.
    pub default: Duration,
    /// Default: 1 hour.
    pub milestones: Duration,
    /// Default: 15 minutes.
    pub news: Duration,
    /// Manifest definitions. Default: 24 hours.
    pub manifest: Duration,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            default: Duration::from_secs(5 * 60),
            milestones: Duration::from_secs(60 * 60),
            news: Duration::from_secs(15 * 60),
            manifest: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl TtlConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default = ttl;
        self
    }

    pub fn milestones(mut self, ttl: Duration) -> Self {
        self.milestones = ttl;
        self
    }

    pub fn news(mut self, ttl: Duration) -> Self {
        self.news = ttl;
        self
    }

    pub fn manifest(mut self, ttl: Duration) -> Self {
        self.manifest = ttl;
        self
    }
}

/// Signed-in user as reported by the auth service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub membership_id: String,
    #[serde(default)]
    pub membership_type: Option<i32>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Answer of the session check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub authenticated: bool,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

/// Body of an item transfer between a character and the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub item_reference_hash: u32,
    pub stack_size: u32,
    pub transfer_to_vault: bool,
    pub item_id: String,
    pub character_id: String,
    pub membership_type: i32,
}

/// Body of an equip call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipRequest {
    pub item_id: String,
    pub character_id: String,
    pub membership_type: i32,
}

impl RequestGateway {
    /// Check the session. Never cached; concurrent checks coalesce.
    pub async fn session(&self) -> Result<SessionStatus> {
        let payload = self
            .request(SESSION, &RequestOptions::get().no_cache(true))
            .await?;
        Ok(SessionStatus::deserialize(payload.as_ref())?)
    }

    pub async fn profile(&self) -> Result<Arc<Value>> {
        self.request(PROFILE, &self.read(self.ttl.default)).await
    }

    /// Activity history for a character, optionally filtered by mode.
    pub async fn activities(
        &self,
        character_id: &str,
        mode: Option<i32>,
        count: Option<u32>,
    ) -> Result<Arc<Value>> {
        let mut options = self.read(self.ttl.default).query("characterId", character_id);
        if let Some(mode) = mode {
            options = options.query("mode", mode.to_string());
        }
        if let Some(count) = count {
            options = options.query("count", count.to_string());
        }
        self.request(ACTIVITIES, &options).await
    }

    pub async fn stats(&self) -> Result<Arc<Value>> {
        self.request(STATS, &self.read(self.ttl.default)).await
    }

    pub async fn vendors(&self, character_id: &str) -> Result<Arc<Value>> {
        let options = self
            .read(self.ttl.default)
            .query("characterId", character_id);
        self.request(VENDORS, &options).await
    }

    pub async fn milestones(&self) -> Result<Arc<Value>> {
        self.request(MILESTONES, &self.read(self.ttl.milestones))
            .await
    }

    pub async fn news(&self, page: Option<u32>) -> Result<Arc<Value>> {
        let mut options = self.read(self.ttl.news);
        if let Some(page) = page {
            options = options.query("page", page.to_string());
        }
        self.request(NEWS, &options).await
    }

    /// One manifest table through the response cache.
    ///
    /// The [`ReferenceDataStore`](crate::ReferenceDataStore) is the
    /// preferred route for definitions; this exists for one-off reads.
    pub async fn manifest_definition(&self, table: &str) -> Result<Arc<Value>> {
        let options = self.read(self.ttl.manifest).query("tableName", table);
        self.request(MANIFEST_DEFINITION, &options).await
    }

    pub async fn transfer(&self, transfer: &TransferRequest) -> Result<Arc<Value>> {
        let body = serde_json::to_value(transfer)?;
        self.request(TRANSFER, &RequestOptions::post(body)).await
    }

    pub async fn equip(&self, equip: &EquipRequest) -> Result<Arc<Value>> {
        let body = serde_json::to_value(equip)?;
        self.request(EQUIP, &RequestOptions::post(body)).await
    }

    fn read(&self, ttl: Duration) -> RequestOptions {
        RequestOptions::get().cache_ttl(ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ttl_defaults() {
        let ttl = TtlConfig::default();
        assert_eq!(ttl.default, Duration::from_secs(300));
        assert_eq!(ttl.milestones, Duration::from_secs(3600));
        assert_eq!(ttl.news, Duration::from_secs(900));
        assert_eq!(ttl.manifest, Duration::from_secs(86_400));
    }

    #[test]
    fn session_status_without_user() {
        let status: SessionStatus = serde_json::from_value(json!({"authenticated": false})).unwrap();
        assert!(!status.authenticated);
        assert!(status.user.is_none());
    }

    #[test]
    fn session_status_keeps_unknown_user_fields() {
        let status: SessionStatus = serde_json::from_value(json!({
            "authenticated": true,
            "user": {"membershipId": "4611", "displayName": "Guardian", "bungieGlobalDisplayNameCode": 42}
        }))
        .unwrap();
        let user = status.user.unwrap();
        assert_eq!(user.membership_id, "4611");
        assert_eq!(user.display_name.as_deref(), Some("Guardian"));
        assert_eq!(user.extra["bungieGlobalDisplayNameCode"], json!(42));
    }

    #[test]
    fn transfer_body_is_camel_case() {
        let body = serde_json::to_value(TransferRequest {
            item_reference_hash: 1,
            stack_size: 1,
            transfer_to_vault: true,
            item_id: "6917".into(),
            character_id: "2305".into(),
            membership_type: 3,
        })
        .unwrap();
        assert_eq!(body["itemReferenceHash"], json!(1));
        assert_eq!(body["transferToVault"], json!(true));
    }
}
