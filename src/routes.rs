//! Application routing with the admission pipeline in front.
//!
//! # Middleware Stack (applied in order)
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │     Recovery     │ ← 500 on panic anywhere below
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │  Rate Limiting   │ ← 429 if exceeded, 500 without peer address
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │  Content-Type    │ ← 415 on mismatch (GET/HEAD bypass)
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │      Accept      │ ← 406 on mismatch
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │   Request Log    │ ← One JSON record per request
//! └────────┬─────────┘
//!          │
//!          ▼
//!   Timeout → Handler
//! ```
//!
//! # Routes
//!
//! - `GET /health` - Liveness
//! - `POST /echo` - JSON echo
//!
//! Unknown paths answer 404 and known paths with the wrong method answer 405,
//! both through the pipeline.

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::timeout::TimeoutLayer;
use tracing::info;

use crate::config::Config;
use crate::handlers;
use crate::pipeline::Pipeline;

/// Application routes without the admission pipeline.
///
/// The write timeout applies to matched routes only; fallbacks answer
/// immediately.
pub fn app_routes(config: &Config) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/echo", post(handlers::echo))
        .route_layer(write_timeout(config))
        .fallback(handlers::not_found)
        .method_not_allowed_fallback(handlers::method_not_allowed)
}

/// Timeout for matched routes; a handler that overruns it answers 408.
fn write_timeout(config: &Config) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, config.write_timeout)
}

/// Build the application router with the admission pipeline applied.
///
/// # Arguments
///
/// * `config` - Application configuration
/// * `pipeline` - Admission pipeline wrapping every route and fallback
///
/// # Returns
///
/// Fully configured Axum router ready to be served.
pub fn build_router(config: &Config, pipeline: Pipeline) -> Router {
    info!(
        burst = config.rate_limit_burst,
        rps = config.rate_limit_rps,
        content_type = config.expected_content_type.as_deref().unwrap_or("disabled"),
        accept = config.expected_accept.as_deref().unwrap_or("disabled"),
        write_timeout_secs = config.write_timeout.as_secs(),
        "Admission pipeline configured"
    );

    pipeline.apply(app_routes(config))
}
