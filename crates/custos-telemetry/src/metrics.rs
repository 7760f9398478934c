//! Prometheus metrics.
//!
//! The recorder is installed once per process. With an address configured
//! the exporter serves its own HTTP listener; without one, metrics are
//! rendered on demand through [`render_metrics`].

use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;

use custos_core::DecisionCode;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Global metrics handle for rendering.
static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether metrics are enabled.
    pub enabled: bool,

    /// Address for a dedicated exporter listener (e.g. `0.0.0.0:9090`).
    pub addr: Option<String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            addr: None,
        }
    }
}

/// Initializes the metrics subsystem.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidAddress` for an unparsable address and
/// `TelemetryError::MetricsInit` if a recorder is already installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    if let Some(addr) = &config.addr {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|e| TelemetryError::InvalidAddress(format!("{addr}: {e}")))?;
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    } else {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
        let _ = METRICS_HANDLE.set(handle);
    }

    register_metric_descriptions();
    Ok(())
}

/// Renders metrics in Prometheus format.
///
/// Returns `None` unless metrics were initialized without a dedicated listener.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn register_metric_descriptions() {
    describe_counter!(
        "custos_authz_decisions_total",
        "Authorization decisions by service and decision code"
    );
    describe_counter!(
        "custos_cache_lookups_total",
        "Attribute bundle cache lookups by result"
    );
    describe_histogram!(
        "custos_refresh_duration_seconds",
        "Time to rebuild an attribute bundle from the store"
    );
    describe_counter!(
        "custos_invalidations_total",
        "Attribute cache invalidations by scope"
    );
    describe_counter!(
        "custos_http_requests_total",
        "Admin HTTP requests by route and status"
    );
}

/// Records an authorization decision.
pub fn record_decision(service: &str, code: DecisionCode) {
    counter!(
        "custos_authz_decisions_total",
        "service" => service.to_string(),
        "code" => code.as_str()
    )
    .increment(1);
}

/// Records a cache lookup. Errors count as misses.
pub fn record_cache_lookup(service: &str, hit: bool) {
    counter!(
        "custos_cache_lookups_total",
        "service" => service.to_string(),
        "result" => if hit { "hit" } else { "miss" }
    )
    .increment(1);
}

/// Records a bundle refresh.
pub fn record_refresh(service: &str, duration: Duration, ok: bool) {
    histogram!(
        "custos_refresh_duration_seconds",
        "service" => service.to_string(),
        "outcome" => if ok { "ok" } else { "error" }
    )
    .record(duration.as_secs_f64());
}

/// Records an invalidation. `scope` is `pair` or `user`.
pub fn record_invalidation(scope: &'static str) {
    counter!("custos_invalidations_total", "scope" => scope).increment(1);
}

/// Records a completed admin HTTP request.
pub fn record_request(route: &str, status_code: u16) {
    counter!(
        "custos_http_requests_total",
        "route" => route.to_string(),
        "status" => status_code.to_string()
    )
    .increment(1);
}
