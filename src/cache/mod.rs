//! Two-tier exact-match response cache.
//!
//! # Key Concepts
//! - L1: in-process LRU bounded by entry count and total serialized bytes
//! - L2: optional shared external store; hits are promoted into L1
//! - Keys: capability + provider scope + md5 of the canonical field JSON
//! - Cacheability: always-cache capabilities, otherwise only deterministic
//!   (zero or unspecified temperature) requests
//!
//! Callers never hold references into the cache; hits are returned as
//! cloned values. Store failures on the L2 tier degrade to misses and never
//! fail a lookup.

mod store;

pub use store::{CacheStoreError, ExternalCacheStore, MemoryCacheStore};

use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::config::CacheConfig;
use crate::contracts::{AiUsage, Capability};

/// Build the cache key for one request.
///
/// `fields` must contain only the semantically relevant request fields;
/// serde_json serializes object keys in sorted order, so structurally
/// identical requests always hash identically regardless of how the
/// projection was built. The md5 digest is used as a fast non-cryptographic
/// hash - collisions only cost a spurious cache answer for a same-capability,
/// same-provider request, which the exact-match projection makes negligible.
pub fn cache_key(capability: Capability, provider_scope: &str, fields: &Value) -> String {
    let digest = md5::compute(fields.to_string().as_bytes());
    format!("{}:{}:{:x}", capability, provider_scope, digest)
}

/// Whether a request for `capability` may be served from cache.
///
/// Content safety and embeddings are deterministic for identical input and
/// always cached. Everything else is cached only when sampling temperature
/// is zero or unspecified - non-zero-temperature generation is intentionally
/// non-deterministic and must not be served stale.
pub fn should_cache(capability: Capability, temperature: Option<f32>) -> bool {
    matches!(
        capability,
        Capability::ContentSafety | Capability::Embedding
    ) || temperature.map_or(true, |t| t == 0.0)
}

/// A cached response, owned by the cache; callers receive clones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResponse {
    pub data: Value,
    pub provider: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// What the original call cost; feeds the cost-saved accounting on hits.
    pub cost_usd: f64,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub hit_count: u64,
}

struct CacheEntry {
    response: CachedResponse,
    size_bytes: usize,
}

/// Hit/miss/eviction counters and the accumulated cost avoided by hits.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
    pub total_bytes: usize,
    pub cost_saved_usd: f64,
}

struct L1Store {
    entries: LruCache<String, CacheEntry>,
    total_bytes: usize,
    stats: CacheStats,
}

/// The two-tier response cache.
pub struct ResponseCache {
    l1: Mutex<L1Store>,
    l2: Option<Arc<dyn ExternalCacheStore>>,
    config: CacheConfig,
}

impl ResponseCache {
    pub fn new(config: CacheConfig, l2: Option<Arc<dyn ExternalCacheStore>>) -> Self {
        let capacity =
            NonZeroUsize::new(config.max_entries.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            l1: Mutex::new(L1Store {
                entries: LruCache::new(capacity),
                total_bytes: 0,
                stats: CacheStats::default(),
            }),
            l2,
            config,
        }
    }

    /// Default TTL for a capability's responses.
    pub fn ttl_for(&self, capability: Capability) -> Duration {
        let secs = match capability {
            Capability::ContentSafety => 3600,
            Capability::Embedding => 86_400,
            Capability::StructuredOutput => 1800,
            Capability::Assessment => 900,
            Capability::TextCompletion => 600,
            _ => self.config.fallback_ttl_secs,
        };
        Duration::from_secs(secs)
    }

    /// Look up a response. Checks L1 first; on a miss, an unexpired L2 hit
    /// is promoted into L1 before being returned.
    pub async fn get(&self, key: &str) -> Option<CachedResponse> {
        let now = Utc::now();
        {
            let mut l1 = self.l1.lock().await;
            let store = &mut *l1;
            let expired = store
                .entries
                .peek(key)
                .map(|e| e.response.expires_at <= now);
            if let Some(true) = expired {
                if let Some(old) = store.entries.pop(key) {
                    store.total_bytes = store.total_bytes.saturating_sub(old.size_bytes);
                }
            } else if let Some(entry) = store.entries.get_mut(key) {
                entry.response.hit_count += 1;
                let response = entry.response.clone();
                store.stats.hits += 1;
                store.stats.cost_saved_usd += response.cost_usd;
                tracing::debug!("Cache hit (L1) for {}", key);
                return Some(response);
            }
        }

        if let Some(l2) = &self.l2 {
            match l2.get(key).await {
                Ok(Some(raw)) => match serde_json::from_str::<CachedResponse>(&raw) {
                    Ok(mut response) if response.expires_at > now => {
                        response.hit_count += 1;
                        let size = response.data.to_string().len();
                        let mut l1 = self.l1.lock().await;
                        self.insert_l1(&mut l1, key, response.clone(), size);
                        l1.stats.hits += 1;
                        l1.stats.cost_saved_usd += response.cost_usd;
                        tracing::debug!("Cache hit (L2, promoted) for {}", key);
                        return Some(response);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("Discarding unparseable L2 cache entry {}: {}", key, e);
                    }
                },
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("L2 cache get failed for {}: {}", key, e);
                }
            }
        }

        let mut l1 = self.l1.lock().await;
        l1.stats.misses += 1;
        tracing::debug!("Cache miss for {}", key);
        None
    }

    /// Store a response in both tiers.
    ///
    /// Payloads above the configured maximum are skipped entirely; a single
    /// entry above 10% of the L1 size budget is refused in L1 (it would
    /// evict everything else) but still written to L2.
    pub async fn set(&self, key: &str, data: Value, usage: &AiUsage, ttl: Duration) {
        let size = data.to_string().len();
        if size > self.config.max_entry_bytes {
            tracing::debug!(
                "Skipping cache for {}: payload {} bytes exceeds limit {}",
                key,
                size,
                self.config.max_entry_bytes
            );
            return;
        }

        let now = Utc::now();
        let response = CachedResponse {
            data,
            provider: usage.provider.clone(),
            model: usage.model.clone(),
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            cost_usd: usage.cost_usd,
            cached_at: now,
            expires_at: now + chrono::Duration::from_std(ttl).unwrap_or_default(),
            hit_count: 0,
        };

        {
            let mut l1 = self.l1.lock().await;
            self.insert_l1(&mut l1, key, response.clone(), size);
        }

        if let Some(l2) = &self.l2 {
            match serde_json::to_string(&response) {
                Ok(raw) => {
                    if let Err(e) = l2.set(key, raw, ttl).await {
                        tracing::warn!("L2 cache set failed for {}: {}", key, e);
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to serialize cache entry {}: {}", key, e);
                }
            }
        }
    }

    /// Remove every entry for a capability, in both tiers. Returns the total
    /// number removed.
    pub async fn invalidate_capability(&self, capability: Capability) -> u64 {
        let prefix = format!("{}:", capability);
        let mut removed: u64 = 0;

        {
            let mut l1 = self.l1.lock().await;
            let keys: Vec<String> = l1
                .entries
                .iter()
                .filter(|(key, _)| key.starts_with(&prefix))
                .map(|(key, _)| key.clone())
                .collect();
            for key in keys {
                if let Some(old) = l1.entries.pop(&key) {
                    l1.total_bytes = l1.total_bytes.saturating_sub(old.size_bytes);
                    removed += 1;
                }
            }
        }

        if let Some(l2) = &self.l2 {
            match l2.invalidate_prefix(&prefix).await {
                Ok(count) => removed += count,
                Err(e) => {
                    tracing::warn!("L2 invalidation failed for prefix {}: {}", prefix, e);
                }
            }
        }

        tracing::info!("Invalidated {} cache entries for {}", removed, capability);
        removed
    }

    /// Counters snapshot for observability.
    pub async fn stats(&self) -> CacheStats {
        let l1 = self.l1.lock().await;
        let mut stats = l1.stats.clone();
        stats.entries = l1.entries.len();
        stats.total_bytes = l1.total_bytes;
        stats
    }

    /// Insert into L1, evicting strictly by recency until both the entry
    /// count and size budget hold. Touch-and-evict happens under the single
    /// L1 lock so size accounting cannot drift.
    fn insert_l1(&self, l1: &mut L1Store, key: &str, response: CachedResponse, size: usize) {
        if size * 10 > self.config.max_total_bytes {
            tracing::debug!(
                "Refusing oversized L1 entry {} ({} bytes against budget {})",
                key,
                size,
                self.config.max_total_bytes
            );
            return;
        }

        if let Some(old) = l1.entries.pop(key) {
            l1.total_bytes = l1.total_bytes.saturating_sub(old.size_bytes);
        }
        while l1.entries.len() >= self.config.max_entries
            || l1.total_bytes + size > self.config.max_total_bytes
        {
            match l1.entries.pop_lru() {
                Some((_, evicted)) => {
                    l1.total_bytes = l1.total_bytes.saturating_sub(evicted.size_bytes);
                    l1.stats.evictions += 1;
                }
                None => break,
            }
        }
        l1.entries.put(
            key.to_string(),
            CacheEntry {
                response,
                size_bytes: size,
            },
        );
        l1.total_bytes += size;
    }
}

/// Shared cache wrapped in Arc for concurrent access.
pub type SharedResponseCache = Arc<ResponseCache>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::CostTier;
    use serde_json::json;

    fn usage(cost: f64) -> AiUsage {
        AiUsage {
            provider: "mock".to_string(),
            model: "mock-1".to_string(),
            input_tokens: 10,
            output_tokens: 5,
            cost_usd: cost,
            duration_ms: 8,
            cached: false,
            tier: CostTier::Standard,
        }
    }

    fn cache(config: CacheConfig) -> ResponseCache {
        ResponseCache::new(config, None)
    }

    #[test]
    fn test_key_is_deterministic_and_field_sensitive() {
        let fields = json!({"prompt": "hi", "temperature": 0.0, "max_tokens": 64});
        let a = cache_key(Capability::TextCompletion, "any", &fields);
        let b = cache_key(Capability::TextCompletion, "any", &fields);
        assert_eq!(a, b);
        assert!(a.starts_with("text-completion:any:"));

        let other = json!({"prompt": "bye", "temperature": 0.0, "max_tokens": 64});
        assert_ne!(a, cache_key(Capability::TextCompletion, "any", &other));
        // same fields under another provider scope must not collide
        assert_ne!(a, cache_key(Capability::TextCompletion, "openai", &fields));
    }

    #[test]
    fn test_should_cache_rules() {
        assert!(should_cache(Capability::ContentSafety, Some(0.9)));
        assert!(should_cache(Capability::Embedding, None));
        assert!(should_cache(Capability::TextCompletion, Some(0.0)));
        assert!(should_cache(Capability::TextCompletion, None));
        assert!(!should_cache(Capability::TextCompletion, Some(0.7)));
        assert!(!should_cache(Capability::Assessment, Some(1.0)));
    }

    #[tokio::test]
    async fn test_set_then_get_hits_and_counts() {
        let c = cache(CacheConfig::default());
        c.set("embedding:any:k1", json!([1, 2, 3]), &usage(0.02), Duration::from_secs(60))
            .await;

        let hit = c.get("embedding:any:k1").await.unwrap();
        assert_eq!(hit.data, json!([1, 2, 3]));
        assert_eq!(hit.hit_count, 1);
        assert_eq!(hit.provider, "mock");

        let stats = c.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
        assert!((stats.cost_saved_usd - 0.02).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let c = cache(CacheConfig::default());
        c.set("assessment:any:k1", json!("graded"), &usage(0.1), Duration::from_millis(20))
            .await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(c.get("assessment:any:k1").await.is_none());
        assert_eq!(c.stats().await.misses, 1);
    }

    #[tokio::test]
    async fn test_oversized_payload_is_never_stored() {
        let config = CacheConfig {
            max_entry_bytes: 16,
            ..CacheConfig::default()
        };
        let c = cache(config);
        c.set(
            "vision:any:k1",
            json!("a rather long description of the image"),
            &usage(0.1),
            Duration::from_secs(60),
        )
        .await;
        assert!(c.get("vision:any:k1").await.is_none());
        assert_eq!(c.stats().await.entries, 0);
    }

    #[tokio::test]
    async fn test_entry_above_tenth_of_budget_refused_in_l1() {
        let config = CacheConfig {
            max_total_bytes: 100,
            ..CacheConfig::default()
        };
        let l2: Arc<dyn ExternalCacheStore> = Arc::new(MemoryCacheStore::new());
        let c = ResponseCache::new(config, Some(l2));
        // 20 serialized bytes > 10% of the 100-byte budget
        c.set(
            "speech:any:k1",
            json!("123456789012345678"),
            &usage(0.1),
            Duration::from_secs(60),
        )
        .await;
        assert_eq!(c.stats().await.entries, 0);
        // still served, via L2
        assert!(c.get("speech:any:k1").await.is_some());
    }

    #[tokio::test]
    async fn test_lru_eviction_by_entry_count() {
        let config = CacheConfig {
            max_entries: 2,
            ..CacheConfig::default()
        };
        let c = cache(config);
        for i in 1..=3 {
            c.set(
                &format!("embedding:any:k{i}"),
                json!(i),
                &usage(0.01),
                Duration::from_secs(60),
            )
            .await;
        }
        assert!(c.get("embedding:any:k1").await.is_none());
        assert!(c.get("embedding:any:k3").await.is_some());
        let stats = c.stats().await;
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.entries, 2);
    }

    #[tokio::test]
    async fn test_size_budget_eviction_keeps_accounting_consistent() {
        let config = CacheConfig {
            max_total_bytes: 40,
            ..CacheConfig::default()
        };
        let c = cache(config);
        // each entry serializes to 3 bytes ("111" etc.)
        for i in 0..5 {
            c.set(
                &format!("embedding:any:k{i}"),
                json!(111),
                &usage(0.01),
                Duration::from_secs(60),
            )
            .await;
        }
        let stats = c.stats().await;
        assert_eq!(stats.entries, 5);
        assert_eq!(stats.total_bytes, 15);
    }

    #[tokio::test]
    async fn test_invalidate_capability_spans_both_tiers() {
        let l2: Arc<dyn ExternalCacheStore> = Arc::new(MemoryCacheStore::new());
        let c = ResponseCache::new(CacheConfig::default(), Some(Arc::clone(&l2)));
        c.set("embedding:any:k1", json!(1), &usage(0.01), Duration::from_secs(60)).await;
        c.set("embedding:any:k2", json!(2), &usage(0.01), Duration::from_secs(60)).await;
        c.set("vision:any:k1", json!(3), &usage(0.01), Duration::from_secs(60)).await;

        // both tiers hold the entries, so each key counts twice
        let removed = c.invalidate_capability(Capability::Embedding).await;
        assert_eq!(removed, 4);
        assert!(c.get("embedding:any:k1").await.is_none());
        assert!(c.get("vision:any:k1").await.is_some());
    }

    #[tokio::test]
    async fn test_l2_hit_is_promoted_into_l1() {
        let l2: Arc<dyn ExternalCacheStore> = Arc::new(MemoryCacheStore::new());
        let writer = ResponseCache::new(CacheConfig::default(), Some(Arc::clone(&l2)));
        writer
            .set("embedding:any:k1", json!([0.5]), &usage(0.03), Duration::from_secs(60))
            .await;

        // a fresh cache shares only the L2 tier
        let reader = ResponseCache::new(CacheConfig::default(), Some(l2));
        let hit = reader.get("embedding:any:k1").await.unwrap();
        assert_eq!(hit.data, json!([0.5]));
        assert_eq!(reader.stats().await.entries, 1);

        // second read must come from L1
        let again = reader.get("embedding:any:k1").await.unwrap();
        assert_eq!(again.hit_count, 2);
    }
}
