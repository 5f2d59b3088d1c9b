//! HTTP admission middleware.
//!
//! Each concern is a standalone Tower layer:
//!
//! - **Recovery**: Catches panics from everything below it and answers 500
//! - **Rate Limiting**: Per-client token bucket keyed by peer IP
//! - **Content Negotiation**: `Content-Type` (415) and `Accept` (406) checks
//! - **Request Logging**: One structured record per admitted request
//!
//! # Architecture
//!
//! ```text
//! Request → Recovery → Rate Limiter → Content-Type → Accept → Request Log → Handler
//!              ↓            ↓              ↓            ↓
//!           500 panic   429 / 500         415          406
//! ```
//!
//! [`crate::pipeline::Pipeline`] assembles them in this order.

use std::future::Future;
use std::pin::Pin;

use axum::body::Body;
use axum::http::Response;

pub mod negotiate;
pub mod peer;
pub mod rate_limit;
pub mod recovery;
pub mod request_log;

pub use negotiate::{AcceptLayer, ContentTypeLayer, accept_acceptable, content_type_acceptable};
pub use peer::{UNKNOWN_ADDR, client_key, peer_addr};
pub use rate_limit::RateLimitLayer;
pub use recovery::RecoveryLayer;
pub use request_log::RequestLogLayer;

/// Boxed response future shared by the middleware services.
pub type ResponseFuture<E> = Pin<Box<dyn Future<Output = Result<Response<Body>, E>> + Send>>;
