//! Structured request logging middleware.
//!
//! Emits one `"HTTP request"` record per request before calling the next
//! service:
//!
//! ```json
//! {"msg":"HTTP request","timestamp":"2024-01-15T10:30:00Z","remote_addr":"10.0.0.1:51234","protocol":"HTTP/1.1","method":"GET","uri":"/health"}
//! ```
//!
//! A failing log sink never fails the request; the error is reported through
//! `tracing` and the request continues.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, Response};
use tower::{Layer, Service};
use tracing::warn;

use super::ResponseFuture;
use super::peer::{UNKNOWN_ADDR, peer_addr};
use crate::log::Logger;

/// Message attached to every request record.
pub const REQUEST_MESSAGE: &str = "HTTP request";

/// Request logging layer for Tower middleware stack.
#[derive(Clone)]
pub struct RequestLogLayer {
    logger: Arc<dyn Logger>,
}

impl RequestLogLayer {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self { logger }
    }
}

impl<S> Layer<S> for RequestLogLayer {
    type Service = RequestLogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestLogService {
            inner,
            logger: self.logger.clone(),
        }
    }
}

/// Request logging service wrapper.
#[derive(Clone)]
pub struct RequestLogService<S> {
    inner: S,
    logger: Arc<dyn Logger>,
}

impl<S> Service<Request<Body>> for RequestLogService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = ResponseFuture<S::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        log_request(self.logger.as_ref(), &req);
        Box::pin(self.inner.call(req))
    }
}

fn log_request<B>(logger: &dyn Logger, req: &Request<B>) {
    let remote_addr = peer_addr(req)
        .map(|addr| addr.to_string())
        .unwrap_or_else(|| UNKNOWN_ADDR.to_string());
    let protocol = format!("{:?}", req.version());
    let method = req.method().as_str();
    let uri = req.uri().to_string();

    if let Err(e) = logger.log(
        REQUEST_MESSAGE,
        &[
            "remote_addr",
            &remote_addr,
            "protocol",
            &protocol,
            "method",
            method,
            "uri",
            &uri,
        ],
    ) {
        warn!(error = %e, uri = %uri, "Failed to write request log record");
    }
}
