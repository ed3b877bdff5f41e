//! Key/value storage backing the transaction store and the token cache.

use crate::error::StorageError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for string key/value storage
///
/// Keys are opaque strings; any value, including names like `constructor` or
/// `__proto__`, is an ordinary key.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Write a value, replacing any previous one
    async fn set(&self, key: &str, value: String) -> StorageResult<()>;

    /// Remove a value, returning whether one was present
    async fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Keys currently stored under `prefix`
    async fn keys(&self, prefix: &str) -> StorageResult<Vec<String>>;
}

/// In-memory implementation of KeyValueStore
#[derive(Clone, Default)]
pub struct InMemoryStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> StorageResult<()> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        let mut entries = self.entries.write().await;
        Ok(entries.remove(key).is_some())
    }

    async fn keys(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryStore::new();

        store.set("a", "1".to_string()).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some("1".to_string()));

        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());
        assert_eq!(store.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reserved_names_are_plain_keys() {
        let store = InMemoryStore::new();

        for key in ["constructor", "__proto__", "toString", "hasOwnProperty"] {
            assert_eq!(store.get(key).await.unwrap(), None);
            assert!(!store.delete(key).await.unwrap());
        }

        store
            .set("__proto__", "value".to_string())
            .await
            .unwrap();
        assert_eq!(
            store.get("__proto__").await.unwrap(),
            Some("value".to_string())
        );
        assert_eq!(store.get("constructor").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_keys_by_prefix() {
        let store = InMemoryStore::new();
        store.set("txs.one", String::new()).await.unwrap();
        store.set("txs.two", String::new()).await.unwrap();
        store.set("cache.one", String::new()).await.unwrap();

        let mut keys = store.keys("txs.").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["txs.one".to_string(), "txs.two".to_string()]);
        assert_eq!(store.len().await, 3);
    }
}
