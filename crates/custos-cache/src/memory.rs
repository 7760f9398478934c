//! In-process TTL cache.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use custos_core::{AttributeBundle, BoxFuture, ServiceName, UserId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::cache::{AttributeCache, CacheKey, CacheStats};
use crate::config::CacheConfig;
use crate::error::CacheResult;

/// Cached bundle, kept in its serialized form.
#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Vec<u8>,
    created_at: Instant,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Attribute cache held in process memory.
///
/// Bundles are stored as JSON, the same bytes a networked cache would hold,
/// so what comes out of the cache is exactly what went in. Expiry uses the
/// tokio clock.
///
/// A key's generation is the sum of its own invalidation counter and its
/// user's. Conditional writes compare it while holding the entry's shard
/// lock, which single-key invalidation also takes.
#[derive(Debug)]
pub struct MemoryAttributeCache {
    config: CacheConfig,
    entries: DashMap<CacheKey, CacheEntry>,
    key_generations: DashMap<CacheKey, u64>,
    user_generations: DashMap<UserId, u64>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    invalidations: AtomicU64,
}

impl Default for MemoryAttributeCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl MemoryAttributeCache {
    /// Create a new cache.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
            key_generations: DashMap::new(),
            user_generations: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    /// The configuration in use.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    fn lookup(&self, key: &CacheKey) -> CacheResult<Option<AttributeBundle>> {
        if !self.config.is_active() {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        }

        let now = Instant::now();
        let payload = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => Some(entry.payload.clone()),
            _ => None,
        };

        let Some(payload) = payload else {
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
            self.misses.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "cache miss");
            return Ok(None);
        };

        match serde_json::from_slice(&payload) {
            Ok(bundle) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                trace!(key = %key, "cache hit");
                Ok(Some(bundle))
            }
            Err(e) => {
                self.entries.remove(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                Err(e.into())
            }
        }
    }

    fn generation_of(&self, key: &CacheKey) -> u64 {
        let own = self.key_generations.get(key).map_or(0, |g| *g);
        let user = self.user_generations.get(&key.user_id).map_or(0, |g| *g);
        own.wrapping_add(user)
    }

    // Writes unless `expected` is given and no longer matches.
    fn store(&self, bundle: &AttributeBundle, ttl: Duration, expected: Option<u64>) -> CacheResult<bool> {
        if !self.config.is_active() || ttl.is_zero() {
            return Ok(true);
        }

        let payload = serde_json::to_vec(bundle)?;
        let now = Instant::now();
        let key = CacheKey::of(bundle);

        if !self.entries.contains_key(&key) && self.entries.len() >= self.config.max_entries {
            self.make_room(now);
        }

        let slot = self.entries.entry(key.clone());
        if let Some(expected) = expected {
            let current = self.generation_of(&key);
            if current != expected {
                trace!(key = %key, expected, current, "stale write skipped");
                return Ok(false);
            }
        }
        slot.insert(CacheEntry {
            payload,
            created_at: now,
            expires_at: now + ttl,
        });
        Ok(true)
    }

    fn make_room(&self, now: Instant) {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let expired = before.saturating_sub(self.entries.len());
        if expired > 0 {
            self.evictions.fetch_add(expired as u64, Ordering::Relaxed);
        }

        while self.entries.len() >= self.config.max_entries {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.value().created_at)
                .map(|entry| entry.key().clone());
            let Some(oldest) = oldest else { break };
            self.entries.remove(&oldest);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn remove(&self, user_id: &UserId, service: Option<&ServiceName>) -> usize {
        let removed = match service {
            Some(service) => {
                let key = CacheKey::new(user_id.clone(), service.clone());
                let slot = self.entries.entry(key.clone());
                *self.key_generations.entry(key).or_insert(0) += 1;
                match slot {
                    Entry::Occupied(entry) => {
                        entry.remove();
                        1
                    }
                    Entry::Vacant(_) => 0,
                }
            }
            None => {
                *self.user_generations.entry(user_id.clone()).or_insert(0) += 1;
                let before = self.entries.len();
                self.entries.retain(|key, _| &key.user_id != user_id);
                before.saturating_sub(self.entries.len())
            }
        };
        self.invalidations.fetch_add(removed as u64, Ordering::Relaxed);
        debug!(user_id = %user_id, service = ?service.map(ServiceName::as_str), removed, "cache invalidated");
        removed
    }
}

impl AttributeCache for MemoryAttributeCache {
    fn get<'a>(
        &'a self,
        user_id: &'a UserId,
        service: &'a ServiceName,
    ) -> BoxFuture<'a, CacheResult<Option<AttributeBundle>>> {
        Box::pin(async move { self.lookup(&CacheKey::new(user_id.clone(), service.clone())) })
    }

    fn put<'a>(&'a self, bundle: &'a AttributeBundle, ttl: Duration) -> BoxFuture<'a, CacheResult<()>> {
        Box::pin(async move { self.store(bundle, ttl, None).map(|_| ()) })
    }

    fn generation<'a>(&'a self, user_id: &'a UserId, service: &'a ServiceName) -> BoxFuture<'a, CacheResult<u64>> {
        Box::pin(async move { Ok(self.generation_of(&CacheKey::new(user_id.clone(), service.clone()))) })
    }

    fn put_if_generation<'a>(
        &'a self,
        bundle: &'a AttributeBundle,
        ttl: Duration,
        generation: u64,
    ) -> BoxFuture<'a, CacheResult<bool>> {
        Box::pin(async move { self.store(bundle, ttl, Some(generation)) })
    }

    fn invalidate<'a>(
        &'a self,
        user_id: &'a UserId,
        service: Option<&'a ServiceName>,
    ) -> BoxFuture<'a, CacheResult<usize>> {
        Box::pin(async move { Ok(self.remove(user_id, service)) })
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.entries.len(),
            evictions: self.evictions.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(user: &str, service: &str) -> AttributeBundle {
        AttributeBundle::new(user, service)
            .authenticated()
            .with_role("billing_admin")
            .with_attribute("budget_limit", 500_i64)
    }

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn test_cache_hit_miss() {
        let cache = MemoryAttributeCache::default();
        let b = bundle("alice", "billing_api");

        assert!(cache.get(&b.user_id, &b.service).await.unwrap().is_none());

        cache.put(&b, HOUR).await.unwrap();
        let cached = cache.get(&b.user_id, &b.service).await.unwrap().unwrap();
        assert_eq!(cached, b);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let cache = MemoryAttributeCache::default();
        let first = bundle("alice", "billing_api");
        let second = AttributeBundle::new("alice", "billing_api").with_role("billing_viewer");

        cache.put(&first, HOUR).await.unwrap();
        cache.put(&second, HOUR).await.unwrap();

        let cached = cache.get(&first.user_id, &first.service).await.unwrap().unwrap();
        assert!(cached.has_role("billing_viewer"));
        assert!(!cached.has_role("billing_admin"));
        assert_eq!(cache.stats().size, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache = MemoryAttributeCache::default();
        let b = bundle("alice", "billing_api");
        cache.put(&b, Duration::from_secs(60)).await.unwrap();

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(cache.get(&b.user_id, &b.service).await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get(&b.user_id, &b.service).await.unwrap().is_none());
        assert_eq!(cache.stats().size, 0);
    }

    #[tokio::test]
    async fn test_invalidate_single_service() {
        let cache = MemoryAttributeCache::default();
        let billing = bundle("alice", "billing_api");
        let inventory = bundle("alice", "inventory_api");
        cache.put(&billing, HOUR).await.unwrap();
        cache.put(&inventory, HOUR).await.unwrap();

        let removed = cache
            .invalidate(&billing.user_id, Some(&billing.service))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(cache.get(&billing.user_id, &billing.service).await.unwrap().is_none());
        assert!(cache.get(&inventory.user_id, &inventory.service).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_invalidate_all_services_of_user() {
        let cache = MemoryAttributeCache::default();
        cache.put(&bundle("alice", "billing_api"), HOUR).await.unwrap();
        cache.put(&bundle("alice", "inventory_api"), HOUR).await.unwrap();
        cache.put(&bundle("bob", "billing_api"), HOUR).await.unwrap();

        let removed = cache.invalidate(&UserId::new("alice"), None).await.unwrap();
        assert_eq!(removed, 2);

        let stats = cache.stats();
        assert_eq!(stats.size, 1);
        assert_eq!(stats.invalidations, 2);
    }

    #[tokio::test]
    async fn test_cache_disabled() {
        let cache = MemoryAttributeCache::new(CacheConfig::disabled());
        let b = bundle("alice", "billing_api");
        cache.put(&b, HOUR).await.unwrap();
        assert!(cache.get(&b.user_id, &b.service).await.unwrap().is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn test_zero_ttl_not_stored() {
        let cache = MemoryAttributeCache::default();
        let b = bundle("alice", "billing_api");
        cache.put(&b, Duration::ZERO).await.unwrap();
        assert_eq!(cache.stats().size, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_evicts_oldest() {
        let cache = MemoryAttributeCache::new(CacheConfig::default().with_max_entries(2));
        for user in ["a", "b", "c"] {
            cache.put(&bundle(user, "billing_api"), HOUR).await.unwrap();
            tokio::time::advance(Duration::from_millis(10)).await;
        }

        let stats = cache.stats();
        assert_eq!(stats.size, 2);
        assert_eq!(stats.evictions, 1);
        let service = ServiceName::new("billing_api");
        assert!(cache.get(&UserId::new("a"), &service).await.unwrap().is_none());
        assert!(cache.get(&UserId::new("c"), &service).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_cache_stats() {
        let cache = MemoryAttributeCache::default();
        let b = bundle("alice", "billing_api");

        cache.get(&b.user_id, &b.service).await.unwrap();
        cache.put(&b, HOUR).await.unwrap();
        cache.get(&b.user_id, &b.service).await.unwrap();
        cache.get(&b.user_id, &b.service).await.unwrap();

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 1);
    }

    #[tokio::test]
    async fn test_conditional_put_after_invalidation_is_skipped() {
        let cache = MemoryAttributeCache::default();
        let b = bundle("alice", "billing_api");

        let generation = cache.generation(&b.user_id, &b.service).await.unwrap();
        cache.invalidate(&b.user_id, Some(&b.service)).await.unwrap();

        assert!(!cache.put_if_generation(&b, HOUR, generation).await.unwrap());
        assert!(cache.get(&b.user_id, &b.service).await.unwrap().is_none());

        let generation = cache.generation(&b.user_id, &b.service).await.unwrap();
        assert!(cache.put_if_generation(&b, HOUR, generation).await.unwrap());
        assert!(cache.get(&b.user_id, &b.service).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_user_invalidation_advances_every_service() {
        let cache = MemoryAttributeCache::default();
        let billing = bundle("alice", "billing_api");
        let inventory = bundle("alice", "inventory_api");
        let other = bundle("bob", "billing_api");

        let billing_gen = cache.generation(&billing.user_id, &billing.service).await.unwrap();
        let inventory_gen = cache.generation(&inventory.user_id, &inventory.service).await.unwrap();
        let other_gen = cache.generation(&other.user_id, &other.service).await.unwrap();

        cache.invalidate(&UserId::new("alice"), None).await.unwrap();

        assert!(!cache.put_if_generation(&billing, HOUR, billing_gen).await.unwrap());
        assert!(!cache.put_if_generation(&inventory, HOUR, inventory_gen).await.unwrap());
        assert!(cache.put_if_generation(&other, HOUR, other_gen).await.unwrap());
        assert_eq!(cache.stats().size, 1);
    }

    #[tokio::test]
    async fn test_unconditional_put_ignores_generation() {
        let cache = MemoryAttributeCache::default();
        let b = bundle("alice", "billing_api");
        cache.invalidate(&b.user_id, Some(&b.service)).await.unwrap();
        cache.put(&b, HOUR).await.unwrap();
        assert!(cache.get(&b.user_id, &b.service).await.unwrap().is_some());
    }
}
