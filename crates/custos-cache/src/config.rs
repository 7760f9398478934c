//! Cache configuration.

/// Configuration for the attribute cache.
///
/// The TTL is not part of it: writers choose a TTL per entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Whether entries are stored at all.
    pub enabled: bool,
    /// Maximum number of entries.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 100_000,
        }
    }
}

impl CacheConfig {
    /// Production settings.
    pub fn production() -> Self {
        Self::default()
    }

    /// Development settings: a small cache.
    pub fn development() -> Self {
        Self {
            enabled: true,
            max_entries: 1_000,
        }
    }

    /// Disable caching. Every read is a miss.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            max_entries: 0,
        }
    }

    /// Sets the capacity.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Returns true if entries can be stored.
    pub const fn is_active(&self) -> bool {
        self.enabled && self.max_entries > 0
    }
}
