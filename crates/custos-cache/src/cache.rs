//! The attribute cache contract.

use std::fmt;
use std::time::Duration;

use custos_core::{AttributeBundle, BoxFuture, ServiceName, UserId};

use crate::error::CacheResult;

/// Composite cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    /// The user.
    pub user_id: UserId,
    /// The service.
    pub service: ServiceName,
}

impl CacheKey {
    /// Creates a key.
    pub fn new(user_id: impl Into<UserId>, service: impl Into<ServiceName>) -> Self {
        Self {
            user_id: user_id.into(),
            service: service.into(),
        }
    }

    /// The key a bundle is stored under.
    pub fn of(bundle: &AttributeBundle) -> Self {
        Self {
            user_id: bundle.user_id.clone(),
            service: bundle.service.clone(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.user_id, self.service)
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses, including expired entries.
    pub misses: u64,
    /// Number of entries currently in cache.
    pub size: usize,
    /// Number of evictions due to capacity.
    pub evictions: u64,
    /// Number of entries removed by invalidation.
    pub invalidations: u64,
}

impl CacheStats {
    /// Fraction of lookups that were hits.
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Key-value cache of attribute bundles.
///
/// Each operation is atomic per key; callers need no locking of their own.
pub trait AttributeCache: Send + Sync + 'static {
    /// Returns the live bundle for `(user_id, service)`, or `None` on a miss.
    fn get<'a>(
        &'a self,
        user_id: &'a UserId,
        service: &'a ServiceName,
    ) -> BoxFuture<'a, CacheResult<Option<AttributeBundle>>>;

    /// Stores `bundle` under its own `(user_id, service)` for `ttl`,
    /// replacing any existing entry.
    fn put<'a>(&'a self, bundle: &'a AttributeBundle, ttl: Duration) -> BoxFuture<'a, CacheResult<()>>;

    /// Current invalidation generation of `(user_id, service)`.
    ///
    /// The value changes whenever the key is invalidated, either alone or
    /// with every service of the user. Only equality is meaningful.
    fn generation<'a>(&'a self, user_id: &'a UserId, service: &'a ServiceName) -> BoxFuture<'a, CacheResult<u64>>;

    /// Stores `bundle` like [`put`](Self::put), but only if the key's
    /// generation still equals `generation`.
    ///
    /// Returns `false`, writing nothing, when the key was invalidated after
    /// `generation` was read. The check and the write are atomic with
    /// respect to [`invalidate`](Self::invalidate).
    fn put_if_generation<'a>(
        &'a self,
        bundle: &'a AttributeBundle,
        ttl: Duration,
        generation: u64,
    ) -> BoxFuture<'a, CacheResult<bool>>;

    /// Removes the entry for one service or, when `service` is `None`,
    /// every entry of the user, and advances the affected generations.
    /// Returns the number of entries removed.
    fn invalidate<'a>(
        &'a self,
        user_id: &'a UserId,
        service: Option<&'a ServiceName>,
    ) -> BoxFuture<'a, CacheResult<usize>>;

    /// Current statistics.
    fn stats(&self) -> CacheStats {
        CacheStats::default()
    }
}
