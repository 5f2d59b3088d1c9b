//! Prometheus metrics for the middleware pipeline.
//!
//! Metrics are exposed via a dedicated HTTP listener (default: `0.0.0.0:9090`).
//!
//! # Available Metrics
//!
//! ## Counters
//! - `http_requests_rate_limited_total` - Requests rejected with 429
//! - `http_panics_recovered_total` - Handler panics turned into 500 responses
//! - `http_negotiation_rejected_total` - Requests rejected by content negotiation
//!   (label: `check` = `content_type` | `accept`)
//!
//! ## Gauges
//! - `http_rate_limit_clients` - Distinct clients tracked by the limiter registry
//!
//! # Usage
//!
//! ```rust,ignore
//! use admission_pipeline::metrics::{init_metrics, record_rate_limited};
//!
//! // Initialize metrics (call once at startup)
//! init_metrics(addr)?;
//!
//! // Recording works with or without an installed exporter
//! record_rate_limited();
//! ```

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{error, info};

/// Metric names as constants for consistency.
pub mod names {
    pub const RATE_LIMITED_TOTAL: &str = "http_requests_rate_limited_total";
    pub const PANICS_RECOVERED_TOTAL: &str = "http_panics_recovered_total";
    pub const NEGOTIATION_REJECTED_TOTAL: &str = "http_negotiation_rejected_total";
    pub const RATE_LIMIT_CLIENTS: &str = "http_rate_limit_clients";
}

/// Initialize the Prometheus metrics exporter.
///
/// # Errors
///
/// Returns a message if the exporter cannot be installed (e.g. port in use
/// or a recorder is already set).
pub fn init_metrics(metrics_addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        names::RATE_LIMITED_TOTAL,
        "Total number of requests rejected by the rate limiter"
    );
    describe_counter!(
        names::PANICS_RECOVERED_TOTAL,
        "Total number of panics caught by the recovery middleware"
    );
    describe_counter!(
        names::NEGOTIATION_REJECTED_TOTAL,
        "Total number of requests rejected by content negotiation"
    );
    describe_gauge!(
        names::RATE_LIMIT_CLIENTS,
        "Number of distinct clients tracked by the limiter registry"
    );

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Try to initialize metrics, logging any errors but not failing.
pub fn try_init_metrics(metrics_addr: SocketAddr) {
    if let Err(e) = init_metrics(metrics_addr) {
        error!(error = %e, "Failed to initialize metrics, continuing without metrics");
    }
}

pub fn record_rate_limited() {
    counter!(names::RATE_LIMITED_TOTAL).increment(1);
}

pub fn record_panic_recovered() {
    counter!(names::PANICS_RECOVERED_TOTAL).increment(1);
}

/// Record a negotiation rejection; `check` is `content_type` or `accept`.
pub fn record_negotiation_rejected(check: &'static str) {
    counter!(names::NEGOTIATION_REJECTED_TOTAL, "check" => check).increment(1);
}

pub fn set_rate_limit_clients(count: usize) {
    gauge!(names::RATE_LIMIT_CLIENTS).set(count as f64);
}
