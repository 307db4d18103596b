//! Tenant access token lifecycle with a persisted cache.
//!
//! The token and its absolute expiry live in the local store so they
//! survive restarts. A cached token is reused until it is within the
//! refresh margin of expiry; then one caller fetches a new one while the
//! others wait on the refresh lock and pick up the result.

use crate::api_client::BitableClient;
use crate::error::{CloudError, CloudResult};
use crate::keys;
use crate::types::Credential;
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use vocab_storage::{KeyValueStore, KeyValueStoreExt};

/// Manages the tenant access token.
pub struct CredentialCache {
    api: Arc<BitableClient>,
    store: Arc<dyn KeyValueStore>,
    refresh_margin_secs: i64,
    expiry_safety_secs: i64,
    /// Serializes refreshes so a burst of callers costs one auth request.
    refresh_lock: Mutex<()>,
}

impl CredentialCache {
    pub fn new(api: Arc<BitableClient>, store: Arc<dyn KeyValueStore>) -> Self {
        let config = api.config();
        let refresh_margin_secs = config.token_refresh_margin_secs;
        let expiry_safety_secs = config.token_expiry_safety_secs;
        Self {
            api,
            store,
            refresh_margin_secs,
            expiry_safety_secs,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Gets a usable credential, refreshing if needed.
    ///
    /// Transport faults that mean the auth endpoint is unreachable come back
    /// as [`CloudError::Connectivity`]; every other failure is
    /// [`CloudError::AuthFailed`].
    pub async fn get_token(&self) -> CloudResult<Credential> {
        // Fast path: cached and not about to expire
        if let Some(c) = self.cached_usable().await {
            debug!("using cached tenant access token");
            return Ok(c);
        }

        let _guard = self.refresh_lock.lock().await;

        // A concurrent caller may have refreshed while we waited.
        if let Some(c) = self.cached_usable().await {
            return Ok(c);
        }

        self.fetch_and_store().await
    }

    /// Forces a refresh regardless of the cached expiry.
    pub async fn refresh(&self) -> CloudResult<Credential> {
        let _guard = self.refresh_lock.lock().await;
        self.fetch_and_store().await
    }

    /// Drops the cached token so the next call fetches a new one.
    pub async fn invalidate(&self) -> CloudResult<()> {
        self.store.remove(keys::FEISHU_TOKEN).await?;
        self.store.remove(keys::TOKEN_EXPIRY).await?;
        self.store.remove(keys::LEGACY_TOKEN_EXPIRY).await?;
        Ok(())
    }

    /// Returns true if a cached token is present and outside the refresh margin.
    pub async fn has_valid_credential(&self) -> bool {
        self.cached_usable().await.is_some()
    }

    /// Runs `op` with a bearer token. If the remote rejects the token itself,
    /// the cache is invalidated and `op` is retried once with a fresh token.
    pub async fn authorized<T, F, Fut>(&self, op: F) -> CloudResult<T>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = CloudResult<T>>,
    {
        let credential = self.get_token().await?;
        match op(credential.token).await {
            Err(e) if e.is_invalid_token() => {
                debug!("remote rejected the cached token ({e}), refreshing");
                self.invalidate().await?;
                let fresh = self.get_token().await?;
                op(fresh.token).await
            }
            other => other,
        }
    }

    async fn cached(&self) -> Option<Credential> {
        let token = self.read::<String>(keys::FEISHU_TOKEN).await?;
        let expires_at_ms = match self.read::<i64>(keys::TOKEN_EXPIRY).await {
            Some(ms) => ms,
            None => self.read::<i64>(keys::LEGACY_TOKEN_EXPIRY).await?,
        };
        Some(Credential {
            token,
            expires_at_ms,
        })
    }

    async fn cached_usable(&self) -> Option<Credential> {
        let now_ms = Utc::now().timestamp_millis();
        self.cached()
            .await
            .filter(|c| c.is_usable_at(now_ms, self.refresh_margin_secs.saturating_mul(1000)))
    }

    /// Reads a cache value; unreadable values count as a cache miss.
    async fn read<T: serde::de::DeserializeOwned + Send>(&self, key: &str) -> Option<T> {
        match self.store.get_as::<T>(key).await {
            Ok(v) => v,
            Err(e) => {
                warn!("ignoring unreadable cached {key}: {e}");
                None
            }
        }
    }

    async fn fetch_and_store(&self) -> CloudResult<Credential> {
        debug!("requesting a new tenant access token");
        let grant = self.api.fetch_tenant_token().await.map_err(|e| {
            warn!("tenant access token request failed: {e}");
            match e {
                CloudError::Connectivity(_) | CloudError::AuthFailed(_) => e,
                other => CloudError::AuthFailed(other.reason()),
            }
        })?;

        let now_ms = Utc::now().timestamp_millis();
        let lifetime_ms = grant
            .expire_secs
            .saturating_sub(self.expiry_safety_secs)
            .saturating_mul(1000);
        let credential = Credential {
            token: grant.token,
            expires_at_ms: now_ms.saturating_add(lifetime_ms),
        };

        self.store.set_as(keys::FEISHU_TOKEN, &credential.token).await?;
        self.store.set_as(keys::TOKEN_EXPIRY, &credential.expires_at_ms).await?;
        self.store
            .set_as(keys::LEGACY_TOKEN_EXPIRY, &credential.expires_at_ms)
            .await?;

        info!(
            "refreshed tenant access token, valid for {}s",
            grant.expire_secs - self.expiry_safety_secs
        );
        Ok(credential)
    }
}
