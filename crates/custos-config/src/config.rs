//! Main configuration types.
//!
//! This module provides the top-level [`CustosConfig`] struct and the
//! conversions into the runtime configuration of each component.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use custos_authz::EngineConfig;
use custos_cache::CacheConfig;
use custos_core::ServiceManifest;
use custos_telemetry::{LogConfig, MetricsConfig, TelemetryConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    CacheConfigSection, ConfigError, ConfigResult, EngineConfigSection, LogFormat, LoggingConfig,
    MetricsConfigSection, ServerConfig, StoreConfig,
};

/// Complete Custos configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and
/// environment variables.
///
/// # Example
///
/// ```
/// use custos_config::CustosConfig;
///
/// let config = CustosConfig::default();
/// assert_eq!(config.server.http_addr, "0.0.0.0:8080");
/// assert_eq!(config.cache.ttl_secs, 86_400);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct CustosConfig {
    /// Admin server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Attribute cache configuration.
    #[serde(default)]
    pub cache: CacheConfigSection,

    /// Attribute store configuration.
    #[serde(default)]
    pub store: StoreConfig,

    /// Policy engine configuration.
    #[serde(default)]
    pub engine: EngineConfigSection,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfigSection,

    /// Service manifest files, read once at startup.
    #[serde(default)]
    pub manifests: Vec<PathBuf>,
}

impl CustosConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - an address does not parse as a socket address
    /// - the cache TTL, the body limit or a timeout is zero
    /// - the service name or identity header is blank
    pub fn validate(&self) -> ConfigResult<()> {
        if self.server.http_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::invalid_value(
                "server.http_addr",
                format!("invalid socket address: {}", self.server.http_addr),
            ));
        }

        if self.server.service_name.trim().is_empty() {
            return Err(ConfigError::invalid_value("server.service_name", "must not be empty"));
        }

        if self.server.identity_header.is_empty()
            || !self
                .server
                .identity_header
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(ConfigError::invalid_value(
                "server.identity_header",
                format!("not a valid header name: {:?}", self.server.identity_header),
            ));
        }

        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::invalid_value("server.max_body_bytes", "must be greater than zero"));
        }

        if self.cache.enabled && self.cache.ttl_secs == 0 {
            return Err(ConfigError::invalid_value("cache.ttl_secs", "must be greater than zero"));
        }

        if self.cache.op_timeout_ms == 0 {
            return Err(ConfigError::invalid_value("cache.op_timeout_ms", "must be greater than zero"));
        }

        if self.store.op_timeout_ms == 0 {
            return Err(ConfigError::invalid_value("store.op_timeout_ms", "must be greater than zero"));
        }

        if let Some(addr) = &self.metrics.addr {
            if self.metrics.enabled && addr.parse::<SocketAddr>().is_err() {
                return Err(ConfigError::invalid_value(
                    "metrics.addr",
                    format!("invalid socket address: {addr}"),
                ));
            }
        }

        Ok(())
    }

    /// Create a development configuration preset.
    ///
    /// - Pretty debug logs with source locations
    /// - 5 minute cache TTL
    /// - Admin server on localhost
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();

        config.server.http_addr = "127.0.0.1:8080".to_string();

        config.logging.level = "debug".to_string();
        config.logging.format = LogFormat::Pretty;
        config.logging.include_location = true;

        config.cache.ttl_secs = 5 * 60;
        config.cache.max_entries = 1_000;

        config
    }

    /// Create a production configuration preset.
    ///
    /// - JSON info logs
    /// - 24 hour cache TTL
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();

        config.logging.level = "info".to_string();
        config.logging.format = LogFormat::Json;
        config.logging.include_location = false;

        config.cache.ttl_secs = 86_400;

        config
    }

    /// Engine timeouts, TTL and refresh behavior.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::new()
            .with_cache_ttl(Duration::from_secs(self.cache.ttl_secs))
            .with_cache_timeout(Duration::from_millis(self.cache.op_timeout_ms))
            .with_store_timeout(Duration::from_millis(self.store.op_timeout_ms))
            .with_auto_refresh(self.engine.auto_refresh)
    }

    /// In-memory cache settings.
    pub fn cache_config(&self) -> CacheConfig {
        if self.cache.enabled {
            CacheConfig::default().with_max_entries(self.cache.max_entries)
        } else {
            CacheConfig::disabled()
        }
    }

    /// Logging and metrics settings.
    pub fn telemetry_config(&self) -> TelemetryConfig {
        let mut logging = LogConfig::production()
            .with_service_name(self.server.service_name.clone())
            .with_level(self.logging.level.clone());
        logging.enabled = self.logging.enabled;
        logging.file_line_info = self.logging.include_location;
        logging.format = match self.logging.format {
            LogFormat::Json => custos_telemetry::LogFormat::Json,
            LogFormat::Pretty => custos_telemetry::LogFormat::Pretty,
        };

        TelemetryConfig {
            logging,
            metrics: MetricsConfig {
                enabled: self.metrics.enabled,
                addr: self.metrics.addr.clone(),
            },
        }
    }

    /// Reads and validates every manifest listed in [`manifests`](Self::manifests).
    ///
    /// The format follows the file extension (`.toml` or `.json`).
    ///
    /// # Errors
    ///
    /// Returns `FileNotFound`, `ReadError` or `Manifest` for the first file
    /// that cannot be used.
    pub fn load_manifests(&self) -> ConfigResult<Vec<ServiceManifest>> {
        self.manifests.iter().map(|path| load_manifest(path)).collect()
    }
}

/// Reads and validates one manifest file.
///
/// # Errors
///
/// Returns `FileNotFound`, `ReadError` or `Manifest`.
pub fn load_manifest(path: &Path) -> ConfigResult<ServiceManifest> {
    if !path.exists() {
        return Err(ConfigError::file_not_found(path));
    }
    let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);
    let manifest = match extension.as_deref() {
        Some("toml") => ServiceManifest::from_toml_str(&content),
        Some("json") => ServiceManifest::from_json_str(&content),
        _ => {
            return Err(ConfigError::validation_error(format!(
                "unsupported manifest format: {}",
                path.display()
            )))
        }
    }
    .map_err(|e| ConfigError::manifest(path, e))?;

    debug!(
        path = %path.display(),
        service = %manifest.name,
        roles = manifest.roles.len(),
        policies = manifest.policies.len(),
        "loaded service manifest"
    );
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CustosConfig::default();
        assert_eq!(config.server.service_name, "custos");
        assert!(config.manifests.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_invalid_server_addr() {
        let mut config = CustosConfig::default();
        config.server.http_addr = "not-an-address".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("http_addr"));
    }

    #[test]
    fn test_validate_zero_ttl() {
        let mut config = CustosConfig::default();
        config.cache.ttl_secs = 0;
        assert!(config.validate().unwrap_err().to_string().contains("ttl_secs"));

        config.cache.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_timeouts() {
        let mut config = CustosConfig::default();
        config.store.op_timeout_ms = 0;
        assert!(config.validate().unwrap_err().to_string().contains("store.op_timeout_ms"));

        let mut config = CustosConfig::default();
        config.cache.op_timeout_ms = 0;
        assert!(config.validate().unwrap_err().to_string().contains("cache.op_timeout_ms"));
    }

    #[test]
    fn test_validate_body_limit() {
        let mut config = CustosConfig::default();
        config.server.max_body_bytes = 0;
        assert!(config.validate().unwrap_err().to_string().contains("server.max_body_bytes"));
    }

    #[test]
    fn test_validate_identity_header() {
        let mut config = CustosConfig::default();
        config.server.identity_header = "x user".to_string();
        assert!(config.validate().unwrap_err().to_string().contains("identity_header"));
    }

    #[test]
    fn test_validate_metrics_addr() {
        let mut config = CustosConfig::default();
        config.metrics.addr = Some("invalid".to_string());
        assert!(config.validate().unwrap_err().to_string().contains("metrics.addr"));

        config.metrics.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets() {
        let dev = CustosConfig::development();
        assert_eq!(dev.logging.format, LogFormat::Pretty);
        assert_eq!(dev.cache.ttl_secs, 300);
        assert!(dev.validate().is_ok());

        let prod = CustosConfig::production();
        assert_eq!(prod.logging.format, LogFormat::Json);
        assert_eq!(prod.cache.ttl_secs, 86_400);
    }

    #[test]
    fn test_engine_config_conversion() {
        let mut config = CustosConfig::default();
        config.cache.ttl_secs = 600;
        config.store.op_timeout_ms = 1_500;
        config.engine.auto_refresh = false;

        let engine = config.engine_config();
        assert_eq!(engine.cache_ttl, Duration::from_secs(600));
        assert_eq!(engine.cache_timeout, Duration::from_millis(250));
        assert_eq!(engine.store_timeout, Duration::from_millis(1_500));
        assert!(!engine.auto_refresh);
    }

    #[test]
    fn test_cache_config_conversion() {
        let mut config = CustosConfig::default();
        config.cache.max_entries = 42;
        assert_eq!(config.cache_config().max_entries, 42);

        config.cache.enabled = false;
        assert!(!config.cache_config().is_active());
    }

    #[test]
    fn test_telemetry_config_conversion() {
        let mut config = CustosConfig::development();
        config.metrics.addr = Some("127.0.0.1:9090".to_string());
        let telemetry = config.telemetry_config();
        assert_eq!(telemetry.logging.level, "debug");
        assert_eq!(telemetry.logging.format, custos_telemetry::LogFormat::Pretty);
        assert!(telemetry.logging.file_line_info);
        assert_eq!(telemetry.logging.service_name, "custos");
        assert_eq!(telemetry.metrics.addr.as_deref(), Some("127.0.0.1:9090"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let toml_str = r#"
            [cache]
            ttl_secs = 60
            ttl_minutes = 1
        "#;
        assert!(toml::from_str::<CustosConfig>(toml_str).is_err());
    }

    #[test]
    fn test_missing_manifest_file() {
        let err = load_manifest(Path::new("/nonexistent/billing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }
}
