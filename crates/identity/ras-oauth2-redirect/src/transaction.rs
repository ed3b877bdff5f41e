//! Pending login transactions, keyed by their encoded state.

use crate::error::{RedirectError, RedirectResult};
use crate::storage::KeyValueStore;
use crate::types::checked_seconds;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

const TRANSACTION_KEY_PREFIX: &str = "ras.oauth2.txs.";

/// Transaction information stored between `begin_login` and the redirect callback
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    pub code_verifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_state: Option<serde_json::Value>,
    pub scope: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Transaction {
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    pub(crate) fn expiry_from_now(
        ttl_seconds: u64,
    ) -> RedirectResult<(DateTime<Utc>, DateTime<Utc>)> {
        let created_at = Utc::now();
        let expires_at = checked_seconds(ttl_seconds)
            .and_then(|ttl| created_at.checked_add_signed(ttl))
            .ok_or_else(|| {
                RedirectError::Config(format!("transaction TTL out of range: {ttl_seconds}"))
            })?;
        Ok((created_at, expires_at))
    }
}

/// Reads and writes [`Transaction`] records through a [`KeyValueStore`].
#[derive(Clone)]
pub struct TransactionManager {
    store: Arc<dyn KeyValueStore>,
}

impl TransactionManager {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn storage_key(state: &str) -> String {
        format!("{TRANSACTION_KEY_PREFIX}{state}")
    }

    /// Persist a transaction under its state
    pub async fn create(&self, transaction: &Transaction) -> RedirectResult<()> {
        let value = serde_json::to_string(transaction)?;
        self.store
            .set(&Self::storage_key(&transaction.state), value)
            .await?;
        debug!("Stored login transaction");
        Ok(())
    }

    /// Look up a transaction.
    ///
    /// Missing and malformed records both come back as `None`; malformed records are deleted.
    /// Expired records are returned and callers decide what to do with them.
    pub async fn get(&self, state: &str) -> RedirectResult<Option<Transaction>> {
        let key = Self::storage_key(state);
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(None);
        };

        match serde_json::from_str::<Transaction>(&raw) {
            Ok(transaction) if transaction.state == state => return Ok(Some(transaction)),
            Ok(_) => warn!("Transaction record does not match its key, discarding"),
            Err(e) => warn!("Malformed transaction record, discarding: {}", e),
        }

        self.store.delete(&key).await?;
        Ok(None)
    }

    /// Remove a transaction, returning whether this call removed it
    pub async fn remove(&self, state: &str) -> RedirectResult<bool> {
        Ok(self.store.delete(&Self::storage_key(state)).await?)
    }

    /// Clean up expired and unreadable transactions
    pub async fn cleanup_expired(&self) -> RedirectResult<usize> {
        let mut count = 0;

        for key in self.store.keys(TRANSACTION_KEY_PREFIX).await? {
            let expired = match self.store.get(&key).await? {
                Some(raw) => serde_json::from_str::<Transaction>(&raw)
                    .map(|transaction| transaction.is_expired())
                    .unwrap_or(true),
                None => false,
            };

            if expired && self.store.delete(&key).await? {
                count += 1;
            }
        }

        Ok(count)
    }
}
