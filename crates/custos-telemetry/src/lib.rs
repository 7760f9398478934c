//! Observability for Custos.
//!
//! - **Logging**: structured `tracing` output, JSON in production and
//!   pretty-printed in development
//! - **Metrics**: Prometheus-format metrics via the `metrics` crate
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `custos_authz_decisions_total` | Counter | `service`, `code` | Authorization decisions |
//! | `custos_cache_lookups_total` | Counter | `service`, `result` | Bundle cache lookups |
//! | `custos_refresh_duration_seconds` | Histogram | `service`, `outcome` | Bundle refresh latency |
//! | `custos_invalidations_total` | Counter | `scope` | Cache invalidations |
//! | `custos_http_requests_total` | Counter | `route`, `status` | Admin HTTP requests |
//!
//! Recording without an installed recorder is a no-op, so libraries can
//! record unconditionally.
//!
//! # Example
//!
//! ```rust,ignore
//! use custos_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let config = TelemetryConfig::production("custos");
//! init_telemetry(&config)?;
//!
//! tracing::info!(service = "billing_api", "Service registered");
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig, LogFormat};
pub use metrics::{
    init_metrics, record_cache_lookup, record_decision, record_invalidation, record_refresh,
    record_request, render_metrics, MetricsConfig,
};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Combined telemetry configuration.
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    /// Logging settings.
    pub logging: LogConfig,
    /// Metrics settings.
    pub metrics: MetricsConfig,
}

impl TelemetryConfig {
    /// Pretty debug logs, metrics rendered on demand.
    pub fn development(service_name: impl Into<String>) -> Self {
        let service_name = service_name.into();
        Self {
            logging: LogConfig::development().with_service_name(service_name),
            metrics: MetricsConfig::default(),
        }
    }

    /// JSON info logs, metrics rendered on demand.
    pub fn production(service_name: impl Into<String>) -> Self {
        let service_name = service_name.into();
        Self {
            logging: LogConfig::production().with_service_name(service_name),
            metrics: MetricsConfig::default(),
        }
    }
}

/// Initializes logging, then metrics.
///
/// # Errors
///
/// Returns `TelemetryError` if either subsystem fails to initialize.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<()> {
    init_logging(&config.logging)?;
    init_metrics(&config.metrics)?;
    Ok(())
}
