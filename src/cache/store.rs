//! External (L2) cache store interface.
//!
//! The L2 tier is optional and injected: deployments back it with a shared
//! store such as Redis so multiple processes can share responses, while the
//! L1 tier stays per-process. Values are opaque serialized strings keyed by
//! the cache key, with TTLs in whole seconds.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;

/// L2 store failure. Store errors never fail a route - the cache layer logs
/// them and degrades to a miss.
#[derive(Debug, thiserror::Error)]
#[error("cache store error: {0}")]
pub struct CacheStoreError(pub String);

/// A shared external cache, scoped get/set/delete plus prefix invalidation.
#[async_trait]
pub trait ExternalCacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheStoreError>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheStoreError>;

    async fn delete(&self, key: &str) -> Result<(), CacheStoreError>;

    /// Remove every key starting with `prefix`, returning how many were
    /// removed.
    async fn invalidate_prefix(&self, prefix: &str) -> Result<u64, CacheStoreError>;
}

/// In-memory [`ExternalCacheStore`] for tests and single-process
/// deployments.
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, (String, DateTime<Utc>)>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExternalCacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheStoreError> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some((value, expires_at)) if *expires_at > Utc::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheStoreError> {
        let expires_at = Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_default();
        self.entries
            .lock()
            .await
            .insert(key.to_string(), (value, expires_at));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheStoreError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn invalidate_prefix(&self, prefix: &str) -> Result<u64, CacheStoreError> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_roundtrip_and_expiry() {
        let store = MemoryCacheStore::new();
        store
            .set("a:1", "one".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.get("a:1").await.unwrap(), Some("one".to_string()));

        store
            .set("a:2", "two".to_string(), Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(store.get("a:2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_store_prefix_invalidation() {
        let store = MemoryCacheStore::new();
        for key in ["embedding:any:1", "embedding:any:2", "vision:any:1"] {
            store
                .set(key, "v".to_string(), Duration::from_secs(60))
                .await
                .unwrap();
        }
        let removed = store.invalidate_prefix("embedding:").await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.get("vision:any:1").await.unwrap(), Some("v".to_string()));
    }
}
