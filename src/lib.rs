//! # Admission Pipeline
//!
//! Admission-controlled HTTP middleware for Axum:
//!
//! - **Rate Limiting**: Per-client continuous token bucket, failing closed
//! - **Panic Recovery**: A panic anywhere below becomes one log record and a 500
//! - **Content Negotiation**: Exact `Content-Type` and `Accept` checks
//! - **Structured Logging**: One JSON line per request, never interleaved
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Recovery → RateLimit → ContentType → Accept → RequestLog   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  LimiterRegistry (ClientKey → TokenBucketLimiter)           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Handlers (health, echo, fallbacks)                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use admission_pipeline::{Config, JsonLogger, Pipeline, build_router, server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let pipeline = Pipeline::from_config(&config, Arc::new(JsonLogger::stdout()))?;
//!     let app = build_router(&config, pipeline);
//!
//!     let listener = tokio::net::TcpListener::bind(config.server_addr()).await?;
//!     server::serve(listener, app, server::shutdown_signal()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Tuning
//!
//! ```bash
//! RATE_LIMIT_BURST=10 RATE_LIMIT_RPS=5 cargo run
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod limiter;
pub mod log;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod pipeline;
pub mod routes;
pub mod server;

// Re-exports for convenience
pub use config::Config;
pub use error::{AppError, AppResult};
pub use limiter::{Allow, ClientKey, LimiterRegistry, Quota, TokenBucketLimiter};
pub use log::{JsonLogger, LogError, Logger, TracingLogger};
pub use pipeline::Pipeline;
pub use routes::build_router;
