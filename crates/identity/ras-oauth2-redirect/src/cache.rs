//! Token cache keyed by client, audience and scope.

use crate::error::RedirectResult;
use crate::jwt::IdTokenClaims;
use crate::storage::KeyValueStore;
use crate::types::{TokenSet, checked_seconds};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

const CACHE_KEY_PREFIX: &str = "@@ras-oauth2@@";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub client_id: String,
    pub audience: String,
    pub scope: String,
}

impl CacheKey {
    pub fn new(
        client_id: impl Into<String>,
        audience: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            audience: audience.into(),
            scope: scope.into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{CACHE_KEY_PREFIX}::{}::{}::{}",
            self.client_id, self.audience, self.scope
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub client_id: String,
    pub audience: String,
    /// Scope that was requested; the scope actually granted lives in the token set
    pub scope: String,
    pub tokens: TokenSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claims: Option<IdTokenClaims>,
}

impl CacheEntry {
    pub fn key(&self) -> CacheKey {
        CacheKey::new(&self.client_id, &self.audience, &self.scope)
    }
}

/// Stores [`CacheEntry`] values in a [`KeyValueStore`]
#[derive(Clone)]
pub struct TokenCache {
    store: Arc<dyn KeyValueStore>,
    leeway_seconds: u64,
}

impl TokenCache {
    pub fn new(store: Arc<dyn KeyValueStore>, leeway_seconds: u64) -> Self {
        Self {
            store,
            leeway_seconds,
        }
    }

    /// Write an entry; the last writer wins
    pub async fn set(&self, entry: &CacheEntry) -> RedirectResult<()> {
        let key = entry.key().to_string();
        self.store.set(&key, serde_json::to_string(entry)?).await?;
        debug!(audience = %entry.audience, scope = %entry.scope, "Cached token set");
        Ok(())
    }

    /// Read an unexpired entry. Missing, malformed and expired entries are all misses.
    pub async fn get(&self, key: &CacheKey) -> RedirectResult<Option<CacheEntry>> {
        let storage_key = key.to_string();
        let Some(raw) = self.store.get(&storage_key).await? else {
            return Ok(None);
        };

        let entry = match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Malformed token cache entry, ignoring: {}", e);
                return Ok(None);
            }
        };

        // A leeway reaching past the representable range means the entry is already stale
        let usable_until = checked_seconds(self.leeway_seconds)
            .and_then(|leeway| entry.tokens.expires_at.checked_sub_signed(leeway));
        if usable_until.is_none_or(|usable_until| Utc::now() >= usable_until) {
            debug!(audience = %key.audience, "Cached token set expired");
            self.store.delete(&storage_key).await?;
            return Ok(None);
        }

        Ok(Some(entry))
    }

    pub async fn remove(&self, key: &CacheKey) -> RedirectResult<bool> {
        Ok(self.store.delete(&key.to_string()).await?)
    }

    /// Remove every cached token set, returning how many were removed
    pub async fn clear(&self) -> RedirectResult<usize> {
        let mut count = 0;
        for key in self.store.keys(CACHE_KEY_PREFIX).await? {
            if self.store.delete(&key).await? {
                count += 1;
            }
        }
        Ok(count)
    }
}
