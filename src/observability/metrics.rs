//! Metric names and helpers wrapping the [`metrics`] crate.
//!
//! # Metrics
//! - `weblane_requests_total` (counter): requests entering any pipeline
//! - `weblane_errors_total` (counter): faults recovered by the pipeline
//! - `weblane_request_duration_seconds` (histogram): latency by method, status
//!
//! Updates are dropped silently unless [`init_metrics`] (or another recorder)
//! has been installed.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Name of the counter tracking handled requests.
pub const REQUESTS_TOTAL: &str = "weblane_requests_total";
/// Name of the counter tracking recovered faults.
pub const ERRORS_TOTAL: &str = "weblane_errors_total";
/// Name of the request latency histogram.
pub const REQUEST_DURATION: &str = "weblane_request_duration_seconds";

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn inc_requests(n: u64) {
    counter!(REQUESTS_TOTAL).increment(n);
}

pub fn inc_errors(n: u64) {
    counter!(ERRORS_TOTAL).increment(n);
}

/// Record the latency of one finished request.
pub fn record_latency(method: &str, status: u16, elapsed: Duration) {
    histogram!(
        REQUEST_DURATION,
        "method" => method.to_owned(),
        "status" => status.to_string()
    )
    .record(elapsed.as_secs_f64());
}
