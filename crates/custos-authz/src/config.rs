//! Configuration for the authorization engine.

use std::time::Duration;

/// Timeouts, TTL and refresh behavior of the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// TTL written with each cached bundle, before capping by role expiry.
    pub cache_ttl: Duration,
    /// Timeout for a single cache call.
    pub cache_timeout: Duration,
    /// Timeout for the store reads of one refresh, or one store write.
    pub store_timeout: Duration,
    /// Whether a cache miss repopulates the cache.
    pub auto_refresh: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(24 * 60 * 60),
            cache_timeout: Duration::from_millis(250),
            store_timeout: Duration::from_secs(2),
            auto_refresh: true,
        }
    }
}

impl EngineConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a production configuration.
    pub fn production() -> Self {
        Self::default()
    }

    /// Create a development configuration with a short TTL.
    pub fn development() -> Self {
        Self {
            cache_ttl: Duration::from_secs(5 * 60),
            ..Self::default()
        }
    }

    /// Set the cache TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Set the cache call timeout.
    pub fn with_cache_timeout(mut self, timeout: Duration) -> Self {
        self.cache_timeout = timeout;
        self
    }

    /// Set the store call timeout.
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Enable or disable refresh on cache miss.
    pub fn with_auto_refresh(mut self, auto_refresh: bool) -> Self {
        self.auto_refresh = auto_refresh;
        self
    }
}
