//! Prometheus metrics
//!
//! Counters and gauges are recorded with the `metrics` macros throughout the
//! server; this module installs the Prometheus recorder and renders the
//! scrape endpoint.

use axum::http::StatusCode;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder; idempotent
pub fn init_metrics() -> Option<&'static PrometheusHandle> {
    match PROMETHEUS_HANDLE.get_or_try_init(|| {
        PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| tracing::error!(error = %e, "failed to install metrics recorder"))
    }) {
        Ok(handle) => Some(handle),
        Err(()) => None,
    }
}

/// `GET /metrics`
pub async fn metrics_handler() -> Result<String, StatusCode> {
    PROMETHEUS_HANDLE
        .get()
        .map(|handle| handle.render())
        .ok_or(StatusCode::SERVICE_UNAVAILABLE)
}
