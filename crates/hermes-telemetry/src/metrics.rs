//! Prometheus metrics for Hermes.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `hermes_dispatches_total` | Counter | `contract`, `kind`, `outcome` | Completed dispatches |
//! | `hermes_dispatch_duration_seconds` | Histogram | `contract`, `kind` | Dispatch latency |
//! | `hermes_in_flight_dispatches` | Gauge | - | Dispatches currently running |
//!
//! Recording functions are no-ops until a recorder is installed, so the
//! engine can call them unconditionally.

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;

/// Counter of completed dispatches.
pub const DISPATCHES_TOTAL: &str = "hermes_dispatches_total";

/// Histogram of dispatch latency.
pub const DISPATCH_DURATION_SECONDS: &str = "hermes_dispatch_duration_seconds";

/// Gauge of running dispatches.
pub const IN_FLIGHT_DISPATCHES: &str = "hermes_in_flight_dispatches";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsConfig {
    /// Whether metrics are enabled.
    pub enabled: bool,

    /// Address to serve the scrape endpoint on (e.g., "0.0.0.0:9090").
    ///
    /// When unset, the recorder is installed without a listener and the
    /// host renders metrics through [`render_metrics`].
    pub addr: Option<String>,

    /// Histogram buckets for dispatch duration, in seconds.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: None,
            // 100us .. 5s
            duration_buckets: vec![
                0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0,
            ],
        }
    }
}

impl MetricsConfig {
    /// Parses the configured listener address, if any.
    pub fn socket_addr(&self) -> TelemetryResult<Option<SocketAddr>> {
        self.addr
            .as_deref()
            .map(|addr| {
                addr.parse()
                    .map_err(|e| TelemetryError::InvalidAddress(format!("{addr}: {e}")))
            })
            .transpose()
    }
}

/// Initializes the metrics subsystem.
///
/// With a listener address the exporter is spawned onto the ambient Tokio
/// runtime (or a background thread if there is none).
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let addr = config.socket_addr()?;

    let builder = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(DISPATCH_DURATION_SECONDS.to_string()),
            &config.duration_buckets,
        )
        .map_err(|e| TelemetryError::InvalidConfig(e.to_string()))?;

    match addr {
        Some(addr) => builder
            .with_http_listener(addr)
            .install()
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?,
        None => {
            let handle = builder
                .install_recorder()
                .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
            let _ = METRICS_HANDLE.set(handle);
        }
    }

    register_metric_descriptions();

    Ok(())
}

/// Renders metrics in Prometheus text format.
///
/// Returns `None` unless the recorder was installed without a listener.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn register_metric_descriptions() {
    describe_counter!(DISPATCHES_TOTAL, "Total number of dispatches completed");
    describe_histogram!(DISPATCH_DURATION_SECONDS, "Dispatch duration in seconds");
    describe_gauge!(
        IN_FLIGHT_DISPATCHES,
        "Number of dispatches currently running"
    );
}

/// Records a completed dispatch.
///
/// `outcome` is `"success"` or an error code such as `"NOT_FOUND"`.
pub fn record_dispatch(contract: &str, kind: &str, outcome: &str, duration: Duration) {
    counter!(
        DISPATCHES_TOTAL,
        "contract" => contract.to_string(),
        "kind" => kind.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        DISPATCH_DURATION_SECONDS,
        "contract" => contract.to_string(),
        "kind" => kind.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Increments the in-flight gauge until dropped.
///
/// The gauge is decremented even if the dispatch future is dropped early.
#[derive(Debug)]
pub struct InFlightGuard {
    _private: (),
}

impl InFlightGuard {
    /// Creates a new guard and increments the in-flight gauge.
    #[must_use]
    pub fn new() -> Self {
        gauge!(IN_FLIGHT_DISPATCHES).increment(1.0);
        Self { _private: () }
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!(IN_FLIGHT_DISPATCHES).decrement(1.0);
    }
}
