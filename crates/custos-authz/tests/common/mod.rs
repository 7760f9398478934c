//! Test doubles and setup shared by the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use custos_authz::{Custos, EngineConfig};
use custos_cache::{AttributeCache, CacheError, CacheResult, CacheStats, MemoryAttributeCache};
use custos_core::{
    fixtures, AttributeBundle, AttributeValue, BoxFuture, RoleAssignment, ServiceManifest, ServiceName, User,
    UserId,
};
use custos_store::{AttributeStore, MemoryAttributeStore, RoleGrant, StoreError, StoreResult};
use uuid::Uuid;

/// Wraps the in-memory cache and counts calls.
#[derive(Debug, Default)]
pub struct CountingCache {
    inner: MemoryAttributeCache,
    gets: AtomicUsize,
    puts: AtomicUsize,
    invalidations: AtomicUsize,
}

impl CountingCache {
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.gets.store(0, Ordering::SeqCst);
        self.puts.store(0, Ordering::SeqCst);
        self.invalidations.store(0, Ordering::SeqCst);
    }
}

impl AttributeCache for CountingCache {
    fn get<'a>(
        &'a self,
        user_id: &'a UserId,
        service: &'a ServiceName,
    ) -> BoxFuture<'a, CacheResult<Option<AttributeBundle>>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(user_id, service)
    }

    fn put<'a>(&'a self, bundle: &'a AttributeBundle, ttl: Duration) -> BoxFuture<'a, CacheResult<()>> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(bundle, ttl)
    }

    fn generation<'a>(&'a self, user_id: &'a UserId, service: &'a ServiceName) -> BoxFuture<'a, CacheResult<u64>> {
        self.inner.generation(user_id, service)
    }

    fn put_if_generation<'a>(
        &'a self,
        bundle: &'a AttributeBundle,
        ttl: Duration,
        generation: u64,
    ) -> BoxFuture<'a, CacheResult<bool>> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put_if_generation(bundle, ttl, generation)
    }

    fn invalidate<'a>(
        &'a self,
        user_id: &'a UserId,
        service: Option<&'a ServiceName>,
    ) -> BoxFuture<'a, CacheResult<usize>> {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        self.inner.invalidate(user_id, service)
    }

    fn stats(&self) -> CacheStats {
        self.inner.stats()
    }
}

/// A cache whose backend is unreachable.
#[derive(Debug, Default)]
pub struct FailingCache {
    calls: AtomicUsize,
}

impl FailingCache {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> CacheResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::unavailable("connection refused"))
    }
}

impl AttributeCache for FailingCache {
    fn get<'a>(
        &'a self,
        _user_id: &'a UserId,
        _service: &'a ServiceName,
    ) -> BoxFuture<'a, CacheResult<Option<AttributeBundle>>> {
        let result = self.fail();
        Box::pin(async move { result })
    }

    fn put<'a>(&'a self, _bundle: &'a AttributeBundle, _ttl: Duration) -> BoxFuture<'a, CacheResult<()>> {
        let result = self.fail();
        Box::pin(async move { result })
    }

    fn generation<'a>(&'a self, _user_id: &'a UserId, _service: &'a ServiceName) -> BoxFuture<'a, CacheResult<u64>> {
        let result = self.fail();
        Box::pin(async move { result })
    }

    fn put_if_generation<'a>(
        &'a self,
        _bundle: &'a AttributeBundle,
        _ttl: Duration,
        _generation: u64,
    ) -> BoxFuture<'a, CacheResult<bool>> {
        let result = self.fail();
        Box::pin(async move { result })
    }

    fn invalidate<'a>(
        &'a self,
        _user_id: &'a UserId,
        _service: Option<&'a ServiceName>,
    ) -> BoxFuture<'a, CacheResult<usize>> {
        let result = self.fail();
        Box::pin(async move { result })
    }
}

/// A cache that never answers within any sensible timeout.
#[derive(Debug, Default)]
pub struct HangingCache;

impl AttributeCache for HangingCache {
    fn get<'a>(
        &'a self,
        _user_id: &'a UserId,
        _service: &'a ServiceName,
    ) -> BoxFuture<'a, CacheResult<Option<AttributeBundle>>> {
        Box::pin(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(None)
        })
    }

    fn put<'a>(&'a self, _bundle: &'a AttributeBundle, _ttl: Duration) -> BoxFuture<'a, CacheResult<()>> {
        Box::pin(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        })
    }

    fn generation<'a>(&'a self, _user_id: &'a UserId, _service: &'a ServiceName) -> BoxFuture<'a, CacheResult<u64>> {
        Box::pin(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(0)
        })
    }

    fn put_if_generation<'a>(
        &'a self,
        _bundle: &'a AttributeBundle,
        _ttl: Duration,
        _generation: u64,
    ) -> BoxFuture<'a, CacheResult<bool>> {
        Box::pin(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(true)
        })
    }

    fn invalidate<'a>(
        &'a self,
        _user_id: &'a UserId,
        _service: Option<&'a ServiceName>,
    ) -> BoxFuture<'a, CacheResult<usize>> {
        Box::pin(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(0)
        })
    }
}

/// Wraps the in-memory store with a switchable outage and read delay.
///
/// Writes always go through so tests can seed data while reads fail.
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: MemoryAttributeStore,
    down: AtomicBool,
    delay_ms: AtomicU64,
    reads: AtomicUsize,
}

impl FlakyStore {
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Number of assignment reads, one per bundle build.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    async fn gate(&self) -> StoreResult<()> {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.down.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("connection refused"));
        }
        Ok(())
    }
}

impl AttributeStore for FlakyStore {
    fn register_service<'a>(&'a self, manifest: &'a ServiceManifest) -> BoxFuture<'a, StoreResult<()>> {
        self.inner.register_service(manifest)
    }

    fn services(&self) -> BoxFuture<'_, StoreResult<Vec<ServiceName>>> {
        Box::pin(async move {
            self.gate().await?;
            self.inner.services().await
        })
    }

    fn manifest<'a>(&'a self, service: &'a ServiceName) -> BoxFuture<'a, StoreResult<Option<ServiceManifest>>> {
        self.inner.manifest(service)
    }

    fn upsert_user(&self, user: User) -> BoxFuture<'_, StoreResult<()>> {
        self.inner.upsert_user(user)
    }

    fn get_user<'a>(&'a self, user_id: &'a UserId) -> BoxFuture<'a, StoreResult<Option<User>>> {
        Box::pin(async move {
            self.gate().await?;
            self.inner.get_user(user_id).await
        })
    }

    fn active_assignments<'a>(
        &'a self,
        user_id: &'a UserId,
        service: &'a ServiceName,
    ) -> BoxFuture<'a, StoreResult<Vec<RoleAssignment>>> {
        Box::pin(async move {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.gate().await?;
            self.inner.active_assignments(user_id, service).await
        })
    }

    fn get_active_role_names<'a>(
        &'a self,
        user_id: &'a UserId,
        service: &'a ServiceName,
    ) -> BoxFuture<'a, StoreResult<BTreeSet<String>>> {
        Box::pin(async move {
            self.gate().await?;
            self.inner.get_active_role_names(user_id, service).await
        })
    }

    fn get_attributes<'a>(
        &'a self,
        user_id: &'a UserId,
        service: &'a ServiceName,
    ) -> BoxFuture<'a, StoreResult<BTreeMap<String, AttributeValue>>> {
        Box::pin(async move {
            self.gate().await?;
            self.inner.get_attributes(user_id, service).await
        })
    }

    fn assign_role(&self, grant: RoleGrant) -> BoxFuture<'_, StoreResult<RoleAssignment>> {
        self.inner.assign_role(grant)
    }

    fn bulk_assign(&self, grants: Vec<RoleGrant>) -> BoxFuture<'_, StoreResult<Vec<RoleAssignment>>> {
        self.inner.bulk_assign(grants)
    }

    fn revoke_role<'a>(
        &'a self,
        user_id: &'a UserId,
        role: &'a str,
        service: &'a ServiceName,
    ) -> BoxFuture<'a, StoreResult<usize>> {
        self.inner.revoke_role(user_id, role, service)
    }

    fn deactivate_assignment(&self, id: Uuid) -> BoxFuture<'_, StoreResult<RoleAssignment>> {
        self.inner.deactivate_assignment(id)
    }

    fn set_attribute<'a>(
        &'a self,
        user_id: &'a UserId,
        service: &'a ServiceName,
        name: &'a str,
        value: AttributeValue,
    ) -> BoxFuture<'a, StoreResult<()>> {
        self.inner.set_attribute(user_id, service, name, value)
    }

    fn remove_attribute<'a>(
        &'a self,
        user_id: &'a UserId,
        service: &'a ServiceName,
        name: &'a str,
    ) -> BoxFuture<'a, StoreResult<bool>> {
        self.inner.remove_attribute(user_id, service, name)
    }
}

/// Users every test starts with.
pub const USERS: [&str; 6] = ["alice", "bob", "carol", "dave", "erin", "frank"];

/// Builds a Custos over the three fixture services and seeds [`USERS`].
///
/// Users are written straight to the store so setup works with a broken cache.
pub async fn custos_with(
    store: Arc<dyn AttributeStore>,
    cache: Arc<dyn AttributeCache>,
    config: EngineConfig,
) -> Custos {
    let custos = Custos::builder()
        .store(store)
        .cache(cache)
        .config(config)
        .manifest(fixtures::billing_manifest())
        .manifest(fixtures::inventory_manifest())
        .manifest(fixtures::identity_manifest())
        .build()
        .await
        .unwrap();
    for id in USERS {
        custos.store().upsert_user(User::new(id, id)).await.unwrap();
    }
    custos
}

/// A Custos over in-memory backends with counting wrapped around the cache.
pub async fn counting_custos() -> (Custos, Arc<CountingCache>) {
    let cache = Arc::new(CountingCache::default());
    let custos = custos_with(
        Arc::new(MemoryAttributeStore::new()),
        cache.clone(),
        EngineConfig::default(),
    )
    .await;
    (custos, cache)
}

pub fn user(id: &str) -> UserId {
    UserId::new(id)
}

pub fn billing() -> ServiceName {
    ServiceName::new("billing_api")
}

pub fn inventory() -> ServiceName {
    ServiceName::new("inventory_api")
}

pub fn identity() -> ServiceName {
    ServiceName::new("identity_provider")
}
