//! Configuration loader with layered approach.
//!
//! This module provides the [`ConfigLoader`] for loading configuration from
//! multiple sources: defaults, files, and environment variables.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{ConfigError, ConfigResult, CustosConfig, LogFormat};

/// Configuration loader with layered approach.
///
/// The loader applies configuration in layers, with later layers overriding
/// earlier ones:
/// 1. Default values (or a preset)
/// 2. Configuration file (TOML or JSON)
/// 3. Environment variables
///
/// Relative manifest paths in a file are resolved against the file's
/// directory.
///
/// # Example
///
/// ```no_run
/// use custos_config::ConfigLoader;
///
/// # fn main() -> Result<(), custos_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_production()
///     .with_optional_file("/etc/custos/custos.toml")?
///     .with_env_prefix("CUSTOS")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: CustosConfig,
    env_prefix: Option<String>,
    file_loaded: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader starting from defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: CustosConfig::default(),
            env_prefix: None,
            file_loaded: false,
        }
    }

    /// Start with default configuration values.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.config = CustosConfig::default();
        self
    }

    /// Start with the development preset.
    ///
    /// # Example
    ///
    /// ```
    /// use custos_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new().with_development().load().unwrap();
    /// assert_eq!(config.cache.ttl_secs, 300);
    /// ```
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = CustosConfig::development();
        self
    }

    /// Start with the production preset.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = CustosConfig::production();
        self
    }

    /// Load configuration from a file.
    ///
    /// Supports TOML (.toml) and JSON (.json); the format follows the
    /// extension. Sections missing from the file keep their values from
    /// the previous layer.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file does not exist, cannot be read,
    /// does not parse, or contains unknown fields.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> ConfigResult<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .ok_or_else(|| {
                ConfigError::validation_error(format!(
                    "unsupported configuration file format: {}",
                    path.display()
                ))
            })?;
        let mut layer = Self::parse(&content, &format)?;

        if let (Some(base), Some(toml::Value::Array(manifests))) = (path.parent(), layer.get_mut("manifests")) {
            for manifest in manifests.iter_mut() {
                if let toml::Value::String(manifest) = manifest {
                    if Path::new(manifest.as_str()).is_relative() {
                        *manifest = base.join(manifest.as_str()).to_string_lossy().into_owned();
                    }
                }
            }
        }

        self.merge(layer)?;
        self.file_loaded = true;
        debug!(path = %path.display(), "loaded configuration file");
        Ok(self)
    }

    /// Load configuration from a file if it exists.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be used.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> ConfigResult<Self> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string in `toml` or `json` format.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if parsing fails.
    ///
    /// # Example
    ///
    /// ```
    /// use custos_config::ConfigLoader;
    ///
    /// let toml = r#"
    ///     [cache]
    ///     ttl_secs = 600
    /// "#;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string(toml, "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.cache.ttl_secs, 600);
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> ConfigResult<Self> {
        let layer = Self::parse(content, &format.to_lowercase())?;
        self.merge(layer)?;
        Ok(self)
    }

    /// Set environment variable prefix for overrides.
    ///
    /// Environment variables use the format `PREFIX__SECTION__KEY`, e.g.
    /// `CUSTOS__CACHE__TTL_SECS=300`. `PREFIX__MANIFESTS` takes a
    /// comma-separated list of paths.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Load a `.env` file into the process environment, if there is one.
    ///
    /// # Errors
    ///
    /// Never fails for a missing file.
    pub fn with_dotenv(self) -> ConfigResult<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                warn!(error = %e, "ignoring unreadable .env file");
            }
        }
        Ok(self)
    }

    /// Whether a configuration file was loaded.
    pub const fn file_loaded(&self) -> bool {
        self.file_loaded
    }

    /// Apply environment overrides and validate.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an environment value does not parse or the
    /// final configuration is invalid.
    pub fn load(mut self) -> ConfigResult<CustosConfig> {
        if let Some(prefix) = self.env_prefix.take() {
            self.apply_env_overrides(&prefix)?;
        }

        self.config.validate()?;

        Ok(self.config)
    }

    /// Finalize without environment overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> CustosConfig {
        self.config
    }

    fn parse(content: &str, format: &str) -> ConfigResult<toml::Table> {
        match format {
            "toml" => Ok(toml::from_str(content)?),
            "json" => Ok(serde_json::from_str(content)?),
            _ => Err(ConfigError::validation_error(format!(
                "unsupported configuration format: {format}"
            ))),
        }
    }

    // Replaces only the sections present in the layer. Unknown fields are
    // rejected when the merged table is deserialized.
    fn merge(&mut self, layer: toml::Table) -> ConfigResult<()> {
        let current = toml::Value::try_from(&self.config)
            .map_err(|e| ConfigError::validation_error(e.to_string()))?;
        let toml::Value::Table(mut merged) = current else {
            return Err(ConfigError::validation_error("configuration is not a table"));
        };
        for (section, value) in layer {
            match (merged.get_mut(&section), value) {
                (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                    for (key, value) in incoming {
                        existing.insert(key, value);
                    }
                }
                (_, value) => {
                    merged.insert(section, value);
                }
            }
        }
        self.config = toml::Value::Table(merged).try_into()?;
        Ok(())
    }

    fn apply_env_overrides(&mut self, prefix: &str) -> ConfigResult<()> {
        let env_vars: BTreeMap<String, String> = env::vars()
            .filter(|(k, _)| k.starts_with(prefix))
            .collect();

        for (key, value) in env_vars {
            self.apply_env_var(&key, &value, prefix)?;
        }

        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> ConfigResult<()> {
        let key_without_prefix = key
            .strip_prefix(prefix)
            .and_then(|k| k.strip_prefix("__"))
            .ok_or_else(|| ConfigError::env_parse_error(key, "invalid key format"))?;

        let parts: Vec<&str> = key_without_prefix.split("__").collect();
        let config = &mut self.config;

        match parts.as_slice() {
            // Server section
            ["SERVER", "HTTP_ADDR"] => config.server.http_addr = value.to_string(),
            ["SERVER", "SERVICE_NAME"] => config.server.service_name = value.to_string(),
            ["SERVER", "IDENTITY_HEADER"] => config.server.identity_header = value.to_lowercase(),
            ["SERVER", "MAX_BODY_BYTES"] => config.server.max_body_bytes = parse_int_var(key, value)?,
            ["SERVER", "BOOTSTRAP_ADMIN"] => {
                config.server.bootstrap_admin = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
            }

            // Cache section
            ["CACHE", "ENABLED"] => config.cache.enabled = parse_bool_var(key, value)?,
            ["CACHE", "TTL_SECS"] => config.cache.ttl_secs = parse_int_var(key, value)?,
            ["CACHE", "OP_TIMEOUT_MS"] => config.cache.op_timeout_ms = parse_int_var(key, value)?,
            ["CACHE", "MAX_ENTRIES"] => config.cache.max_entries = parse_int_var(key, value)?,

            // Store section
            ["STORE", "OP_TIMEOUT_MS"] => config.store.op_timeout_ms = parse_int_var(key, value)?,

            // Engine section
            ["ENGINE", "AUTO_REFRESH"] => config.engine.auto_refresh = parse_bool_var(key, value)?,

            // Logging section
            ["LOGGING", "ENABLED"] => config.logging.enabled = parse_bool_var(key, value)?,
            ["LOGGING", "LEVEL"] => config.logging.level = value.to_string(),
            ["LOGGING", "FORMAT"] => {
                config.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => return Err(ConfigError::env_parse_error(key, "expected 'json' or 'pretty'")),
                };
            }
            ["LOGGING", "INCLUDE_LOCATION"] => config.logging.include_location = parse_bool_var(key, value)?,

            // Metrics section
            ["METRICS", "ENABLED"] => config.metrics.enabled = parse_bool_var(key, value)?,
            ["METRICS", "ADDR"] => {
                config.metrics.addr = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
            }

            ["MANIFESTS"] => {
                config.manifests = value
                    .split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(PathBuf::from)
                    .collect();
            }

            _ => debug!(var = key, "ignoring unrecognized configuration variable"),
        }

        Ok(())
    }
}

/// Parse a boolean from a string.
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_bool_var(key: &str, value: &str) -> ConfigResult<bool> {
    parse_bool(value).ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))
}

fn parse_int_var<T: std::str::FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loader_new() {
        let config = ConfigLoader::new().load().unwrap();
        assert_eq!(config.server.http_addr, "0.0.0.0:8080");
    }

    #[test]
    fn test_loader_with_development() {
        let config = ConfigLoader::new().with_development().load().unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_loader_with_production() {
        let config = ConfigLoader::new().with_production().load().unwrap();
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_string_layer_keeps_unmentioned_sections() {
        let toml = r#"
            [cache]
            ttl_secs = 600
        "#;

        let config = ConfigLoader::new()
            .with_development()
            .with_string(toml, "toml")
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(config.cache.ttl_secs, 600);
        assert_eq!(config.cache.max_entries, 1_000);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_loader_with_string_json() {
        let json = r#"{"server": {"service_name": "gatekeeper"}, "engine": {"auto_refresh": false}}"#;

        let config = ConfigLoader::new()
            .with_string(json, "json")
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(config.server.service_name, "gatekeeper");
        assert_eq!(config.server.http_addr, "0.0.0.0:8080");
        assert!(!config.engine.auto_refresh);
    }

    #[test]
    fn test_loader_rejects_unknown_field() {
        let toml = r#"
            [engine]
            auto_refresh = true
            eager = true
        "#;
        assert!(ConfigLoader::new().with_string(toml, "toml").is_err());
    }

    #[test]
    fn test_loader_rejects_unknown_format() {
        assert!(ConfigLoader::new().with_string("", "yaml").is_err());
    }

    #[test]
    fn test_loader_with_file_not_found() {
        let result = ConfigLoader::new().with_file("/nonexistent/custos.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_loader_with_optional_file_not_found() {
        let loader = ConfigLoader::new()
            .with_optional_file("/nonexistent/custos.toml")
            .unwrap();
        assert!(!loader.file_loaded());
        assert_eq!(loader.load().unwrap().server.http_addr, "0.0.0.0:8080");
    }

    #[test]
    fn test_load_validates() {
        let toml = r#"
            [store]
            op_timeout_ms = 0
        "#;
        let loader = ConfigLoader::new().with_string(toml, "toml").unwrap();
        assert!(loader.load().is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("on"), Some(true));
        assert_eq!(parse_bool("False"), Some(false));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
        assert_eq!(parse_bool(""), None);
    }

    #[test]
    fn test_apply_env_var_cache() {
        let mut loader = ConfigLoader::new();
        loader.apply_env_var("TEST__CACHE__TTL_SECS", "300", "TEST").unwrap();
        loader.apply_env_var("TEST__CACHE__ENABLED", "no", "TEST").unwrap();
        assert_eq!(loader.config.cache.ttl_secs, 300);
        assert!(!loader.config.cache.enabled);
    }

    #[test]
    fn test_apply_env_var_server() {
        let mut loader = ConfigLoader::new();
        loader.apply_env_var("TEST__SERVER__IDENTITY_HEADER", "X-User-Id", "TEST").unwrap();
        loader.apply_env_var("TEST__SERVER__HTTP_ADDR", "127.0.0.1:9000", "TEST").unwrap();
        assert_eq!(loader.config.server.identity_header, "x-user-id");

        loader.apply_env_var("TEST__SERVER__MAX_BODY_BYTES", "1024", "TEST").unwrap();
        assert_eq!(loader.config.server.max_body_bytes, 1024);
        assert_eq!(loader.config.server.http_addr, "127.0.0.1:9000");
    }

    #[test]
    fn test_apply_env_var_manifests() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("TEST__MANIFESTS", "billing.toml, inventory.json,", "TEST")
            .unwrap();
        assert_eq!(
            loader.config.manifests,
            vec![PathBuf::from("billing.toml"), PathBuf::from("inventory.json")]
        );
    }

    #[test]
    fn test_apply_env_var_invalid_integer() {
        let mut loader = ConfigLoader::new();
        let result = loader.apply_env_var("TEST__STORE__OP_TIMEOUT_MS", "soon", "TEST");
        assert!(matches!(result, Err(ConfigError::EnvParseError { .. })));
    }

    #[test]
    fn test_apply_env_var_log_format() {
        let mut loader = ConfigLoader::new();
        loader.apply_env_var("TEST__LOGGING__FORMAT", "pretty", "TEST").unwrap();
        assert_eq!(loader.config.logging.format, LogFormat::Pretty);
        assert!(loader.apply_env_var("TEST__LOGGING__FORMAT", "xml", "TEST").is_err());
    }

    #[test]
    fn test_apply_env_var_metrics_addr() {
        let mut loader = ConfigLoader::new();
        loader.apply_env_var("TEST__METRICS__ADDR", "0.0.0.0:9090", "TEST").unwrap();
        assert_eq!(loader.config.metrics.addr.as_deref(), Some("0.0.0.0:9090"));
        loader.apply_env_var("TEST__METRICS__ADDR", "", "TEST").unwrap();
        assert_eq!(loader.config.metrics.addr, None);
    }

    #[test]
    fn test_apply_env_var_unknown_is_ignored() {
        let mut loader = ConfigLoader::new();
        assert!(loader.apply_env_var("TEST__CACHE__COLOR", "blue", "TEST").is_ok());
    }
}
