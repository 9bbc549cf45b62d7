//! Metrics collection and Prometheus export.
//!
//! Initializes the metrics exporter and provides the /metrics endpoint handler.

use anyhow::Context;
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

pub const UPLOADS_TOTAL: &str = "relay_uploads_total";
pub const UPLOAD_BYTES_TOTAL: &str = "relay_upload_bytes_total";
pub const JOBS_SUBMITTED_TOTAL: &str = "relay_jobs_submitted_total";
pub const STATUS_QUERIES_TOTAL: &str = "relay_status_queries_total";

/// Global handle to the Prometheus recorder.
static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder.
///
/// Call once at startup before any metrics are recorded; later calls are no-ops.
pub fn init_metrics() -> anyhow::Result<()> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")?;
    let _ = METRICS_HANDLE.set(handle);

    describe_counter!(UPLOADS_TOTAL, "Upload requests by result");
    describe_counter!(UPLOAD_BYTES_TOTAL, "Bytes written to object storage");
    describe_counter!(JOBS_SUBMITTED_TOTAL, "Generation job submissions by result");
    describe_counter!(STATUS_QUERIES_TOTAL, "Task status queries by result");
    describe_counter!("http_requests_total", "HTTP requests by route and status");
    describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request latency by route and status"
    );

    Ok(())
}

/// Current metrics in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}
