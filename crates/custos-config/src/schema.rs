//! Configuration schema types.
//!
//! This module defines the structure of all configuration sections.

use serde::{Deserialize, Serialize};

/// Admin server configuration section.
///
/// # Example
///
/// ```
/// use custos_config::ServerConfig;
///
/// let config = ServerConfig {
///     http_addr: "127.0.0.1:8080".to_string(),
///     ..Default::default()
/// };
/// assert_eq!(config.service_name, "custos");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// HTTP bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// Service identity the admin endpoints are authorized against.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Header carrying the verified id of the calling user.
    #[serde(default = "default_identity_header")]
    pub identity_header: String,

    /// User granted the cache admin role of `service_name` at startup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootstrap_admin: Option<String>,

    /// Largest accepted request body in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            service_name: default_service_name(),
            identity_header: default_identity_header(),
            bootstrap_admin: None,
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_http_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_service_name() -> String {
    "custos".to_string()
}

fn default_identity_header() -> String {
    "x-custos-user".to_string()
}

const fn default_max_body_bytes() -> usize {
    64 * 1024
}

/// Attribute cache configuration section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CacheConfigSection {
    /// Cache bundles at all. When false every decision reads the store.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Lifetime of a cached bundle in seconds.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Timeout of a single cache call in milliseconds.
    #[serde(default = "default_cache_timeout_ms")]
    pub op_timeout_ms: u64,

    /// Entry limit of the in-memory cache.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl Default for CacheConfigSection {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_ttl_secs(),
            op_timeout_ms: default_cache_timeout_ms(),
            max_entries: default_max_entries(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    86_400
}

fn default_cache_timeout_ms() -> u64 {
    250
}

fn default_max_entries() -> usize {
    100_000
}

/// Attribute store configuration section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Timeout of a single store call in milliseconds.
    #[serde(default = "default_store_timeout_ms")]
    pub op_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            op_timeout_ms: default_store_timeout_ms(),
        }
    }
}

fn default_store_timeout_ms() -> u64 {
    2_000
}

/// Policy engine configuration section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EngineConfigSection {
    /// Rebuild and cache a bundle on a cache miss.
    #[serde(default = "default_true")]
    pub auto_refresh: bool,
}

impl Default for EngineConfigSection {
    fn default() -> Self {
        Self { auto_refresh: true }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON formatted logs (production).
    #[default]
    Json,
    /// Human-readable pretty format (development).
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Enable logging.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Filter directive (e.g. `info` or `custos_authz=debug,hyper=warn`).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include source file and line in logs.
    #[serde(default)]
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::default(),
            include_location: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfigSection {
    /// Enable metrics collection.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Dedicated Prometheus listener. Without it metrics are served by the
    /// admin server at `/metrics`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addr: Option<String>,
}

impl Default for MetricsConfigSection {
    fn default() -> Self {
        Self {
            enabled: true,
            addr: None,
        }
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_defaults() {
        assert_eq!(ServerConfig::default().identity_header, "x-custos-user");
        assert_eq!(ServerConfig::default().max_body_bytes, 65_536);
        assert_eq!(CacheConfigSection::default().ttl_secs, 86_400);
        assert_eq!(StoreConfig::default().op_timeout_ms, 2_000);
        assert!(EngineConfigSection::default().auto_refresh);
        assert_eq!(MetricsConfigSection::default().addr, None);
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let cache: CacheConfigSection = toml::from_str("ttl_secs = 300").unwrap();
        assert_eq!(cache.ttl_secs, 300);
        assert_eq!(cache.op_timeout_ms, 250);
        assert!(cache.enabled);
    }

    #[test]
    fn test_log_format_lowercase() {
        let logging: LoggingConfig = toml::from_str(r#"format = "pretty""#).unwrap();
        assert_eq!(logging.format, LogFormat::Pretty);
        assert!(toml::from_str::<LoggingConfig>(r#"format = "Pretty""#).is_err());
    }
}
