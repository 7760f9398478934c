//! Bundle refresh pipeline.
//!
//! Reads a user's active role assignments and attributes for one service
//! from the store, assembles an [`AttributeBundle`] and writes it to the
//! cache. Cache failures never fail a refresh; store failures always do.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use custos_cache::{AttributeCache, CacheError};
use custos_core::{AttributeBundle, ServiceName, UserId};
use custos_store::{AttributeStore, StoreError};
use custos_telemetry::{record_cache_lookup, record_refresh};
use tracing::{debug, error, warn};

use crate::config::EngineConfig;
use crate::error::{AuthzError, AuthzResult};

/// Runs a store call under `timeout`, mapping a timeout to an outage.
pub(crate) async fn store_call<T, F>(timeout: Duration, call: F) -> AuthzResult<T>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result.map_err(AuthzError::from),
        Err(_) => Err(AuthzError::store_unavailable(format!(
            "timed out after {}ms",
            timeout.as_millis()
        ))),
    }
}

/// Runs a cache call under `timeout`, mapping a timeout to a cache error.
pub(crate) async fn cache_call<T, F>(timeout: Duration, call: F) -> Result<T, CacheError>
where
    F: Future<Output = Result<T, CacheError>>,
{
    tokio::time::timeout(timeout, call)
        .await
        .unwrap_or(Err(CacheError::Timeout(timeout)))
}

/// Rebuilds attribute bundles from the store and repopulates the cache.
///
/// Safe to call concurrently for the same key: every refresh writes a
/// complete bundle, so the cache ends up holding whichever finished last,
/// unless the key was invalidated after that refresh started reading.
pub struct RefreshPipeline {
    store: Arc<dyn AttributeStore>,
    cache: Arc<dyn AttributeCache>,
    config: EngineConfig,
}

impl std::fmt::Debug for RefreshPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshPipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RefreshPipeline {
    /// Creates a pipeline.
    pub fn new(store: Arc<dyn AttributeStore>, cache: Arc<dyn AttributeCache>, config: EngineConfig) -> Self {
        Self { store, cache, config }
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<dyn AttributeStore> {
        &self.store
    }

    /// The cache.
    pub fn cache(&self) -> &Arc<dyn AttributeCache> {
        &self.cache
    }

    /// Builds a bundle from the store without touching the cache.
    ///
    /// Only active assignments contribute roles. The bundle is valid until
    /// the earliest expiry among them.
    pub async fn build_bundle(&self, user_id: &UserId, service: &ServiceName) -> AuthzResult<AttributeBundle> {
        let store = &self.store;
        store_call(self.config.store_timeout, async {
            let user = store.get_user(user_id).await?;
            let assignments = store.active_assignments(user_id, service).await?;
            let attributes = store.get_attributes(user_id, service).await?;

            let mut bundle = AttributeBundle::new(user_id.clone(), service.clone());
            bundle.authenticated = user.is_some_and(|u| u.is_active);
            bundle.valid_until = assignments.iter().filter_map(|a| a.expires_at).min();
            bundle.roles = assignments.into_iter().map(|a| a.role).collect();
            bundle.attributes = attributes;
            Ok::<_, StoreError>(bundle)
        })
        .await
    }

    /// Rebuilds the bundle and writes it to the cache.
    ///
    /// Fails only if the store fails. A cache write failure is logged and
    /// the fresh bundle is still returned. The key's cache generation is
    /// read before the store, and the bundle is written back only if no
    /// invalidation happened in between, so a refresh racing a mutation
    /// never restores the pre-mutation grants.
    pub async fn refresh(&self, user_id: &UserId, service: &ServiceName) -> AuthzResult<AttributeBundle> {
        let generation = match cache_call(self.config.cache_timeout, self.cache.generation(user_id, service)).await {
            Ok(generation) => Some(generation),
            Err(e) => {
                warn!(user_id = %user_id, service = %service, error = %e, "cache generation unavailable, bundle will not be cached");
                None
            }
        };

        let started = Instant::now();
        let result = self.build_bundle(user_id, service).await;
        record_refresh(service.as_str(), started.elapsed(), result.is_ok());

        let bundle = match result {
            Ok(bundle) => bundle,
            Err(e) => {
                error!(user_id = %user_id, service = %service, error = %e, "bundle refresh failed");
                return Err(e);
            }
        };

        let Some(generation) = generation else {
            return Ok(bundle);
        };

        let ttl = bundle.ttl(self.config.cache_ttl, Utc::now());
        let write = self.cache.put_if_generation(&bundle, ttl, generation);
        match cache_call(self.config.cache_timeout, write).await {
            Ok(true) => debug!(
                user_id = %user_id,
                service = %service,
                roles = bundle.roles.len(),
                ttl_secs = ttl.as_secs(),
                "bundle refreshed"
            ),
            Ok(false) => debug!(
                user_id = %user_id,
                service = %service,
                "bundle invalidated during refresh, not cached"
            ),
            Err(e) => {
                warn!(user_id = %user_id, service = %service, error = %e, "cache write failed, serving uncached bundle");
            }
        }
        Ok(bundle)
    }

    /// Reads the cached bundle. Cache errors and timeouts count as a miss.
    pub async fn cached(&self, user_id: &UserId, service: &ServiceName) -> Option<AttributeBundle> {
        let hit = match cache_call(self.config.cache_timeout, self.cache.get(user_id, service)).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(user_id = %user_id, service = %service, error = %e, "cache read failed, treating as miss");
                None
            }
        };
        record_cache_lookup(service.as_str(), hit.is_some());
        hit
    }

    /// Returns the cached bundle or, on a miss, a fresh one.
    ///
    /// With `auto_refresh` the fresh bundle is written back to the cache;
    /// without it the store is read and the cache left alone.
    pub async fn get(&self, user_id: &UserId, service: &ServiceName, auto_refresh: bool) -> AuthzResult<AttributeBundle> {
        if let Some(bundle) = self.cached(user_id, service).await {
            return Ok(bundle);
        }
        if auto_refresh {
            self.refresh(user_id, service).await
        } else {
            self.build_bundle(user_id, service).await
        }
    }
}
