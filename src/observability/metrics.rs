//! Metrics collection and exposition.
//!
//! # Metrics
//! - `rpc_requests_total` (counter): dispatches by method, outcome
//! - `rpc_request_duration_seconds` (histogram): decode-to-write latency
//! - `rpc_active_connections` (gauge): open socket connections

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use thiserror::Error;

pub const REQUESTS_TOTAL: &str = "rpc_requests_total";
pub const REQUEST_DURATION: &str = "rpc_request_duration_seconds";
pub const ACTIVE_CONNECTIONS: &str = "rpc_active_connections";

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("failed to install Prometheus exporter on {address}: {source}")]
    Install {
        address: SocketAddr,
        #[source]
        source: BuildError,
    },
}

/// Install the global recorder and serve `/metrics` on `addr`.
///
/// Must be called from inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|source| MetricsError::Install {
            address: addr,
            source,
        })?;

    ::metrics::describe_counter!(REQUESTS_TOTAL, "Dispatched JSON-RPC requests");
    ::metrics::describe_histogram!(
        REQUEST_DURATION,
        ::metrics::Unit::Seconds,
        "Time from first byte read to response written"
    );
    ::metrics::describe_gauge!(ACTIVE_CONNECTIONS, "Open socket connections");

    tracing::info!(address = %addr, "metrics exporter listening");
    Ok(())
}

/// Record one finished dispatch.
pub fn record_dispatch(method: &str, outcome: &'static str, started: Instant) {
    ::metrics::counter!(REQUESTS_TOTAL, "method" => method.to_string(), "outcome" => outcome)
        .increment(1);
    ::metrics::histogram!(REQUEST_DURATION, "method" => method.to_string())
        .record(started.elapsed().as_secs_f64());
}

pub fn connection_opened() {
    ::metrics::gauge!(ACTIVE_CONNECTIONS).increment(1.0);
}

pub fn connection_closed() {
    ::metrics::gauge!(ACTIVE_CONNECTIONS).decrement(1.0);
}
