//! Content negotiation middleware.
//!
//! Two independent checks, each its own layer so either can be left out:
//!
//! - [`ContentTypeLayer`]: rejects request bodies of the wrong media type with 415.
//!   `GET` and `HEAD` carry no body and bypass the check. A missing or empty
//!   `Content-Type` header is accepted.
//! - [`AcceptLayer`]: rejects clients that cannot take the configured response
//!   type with 406. A missing or empty `Accept` header and `*/*` are accepted.
//!
//! Matching is exact string comparison: `application/json; charset=utf-8`
//! does not match `application/json`.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{HeaderValue, Method, Request, Response, header};
use axum::response::IntoResponse;
use tower::{Layer, Service};
use tracing::debug;

use super::ResponseFuture;
use crate::error::AppError;
use crate::metrics;

/// Wildcard media range accepted by [`AcceptLayer`].
pub const ANY_MEDIA_TYPE: &str = "*/*";

/// Whether a request with this method and `Content-Type` may proceed.
pub fn content_type_acceptable(
    method: &Method,
    content_type: Option<&HeaderValue>,
    expected: &str,
) -> bool {
    if method == Method::GET || method == Method::HEAD {
        return true;
    }
    match content_type {
        None => true,
        Some(value) if value.is_empty() => true,
        Some(value) => value.to_str().is_ok_and(|v| v == expected),
    }
}

/// Whether a request with this `Accept` header may proceed.
pub fn accept_acceptable(accept: Option<&HeaderValue>, expected: &str) -> bool {
    match accept {
        None => true,
        Some(value) if value.is_empty() => true,
        Some(value) => value
            .to_str()
            .is_ok_and(|v| v == ANY_MEDIA_TYPE || v == expected),
    }
}

// =============================================================================
// Content-Type
// =============================================================================

/// Layer enforcing the request `Content-Type`.
#[derive(Clone)]
pub struct ContentTypeLayer {
    expected: Option<Arc<str>>,
}

impl ContentTypeLayer {
    pub fn new(expected: impl Into<Arc<str>>) -> Self {
        Self {
            expected: Some(expected.into()),
        }
    }

    /// A layer that lets every request through.
    pub fn disabled() -> Self {
        Self { expected: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.expected.is_some()
    }
}

impl<S> Layer<S> for ContentTypeLayer {
    type Service = ContentTypeService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ContentTypeService {
            inner,
            expected: self.expected.clone(),
        }
    }
}

#[derive(Clone)]
pub struct ContentTypeService<S> {
    inner: S,
    expected: Option<Arc<str>>,
}

impl<S> Service<Request<Body>> for ContentTypeService<S>
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
        if let Some(expected) = &self.expected {
            let content_type = req.headers().get(header::CONTENT_TYPE);
            if !content_type_acceptable(req.method(), content_type, expected) {
                let received = content_type
                    .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                    .unwrap_or_default();
                debug!(
                    method = %req.method(),
                    content_type = %received,
                    expected = %expected,
                    "Unsupported request content type"
                );
                metrics::record_negotiation_rejected("content_type");
                let response = AppError::UnsupportedMediaType(received).into_response();
                return Box::pin(async move { Ok(response) });
            }
        }

        Box::pin(self.inner.call(req))
    }
}

// =============================================================================
// Accept
// =============================================================================

/// Layer enforcing the request `Accept` header.
#[derive(Clone)]
pub struct AcceptLayer {
    expected: Option<Arc<str>>,
}

impl AcceptLayer {
    pub fn new(expected: impl Into<Arc<str>>) -> Self {
        Self {
            expected: Some(expected.into()),
        }
    }

    /// A layer that lets every request through.
    pub fn disabled() -> Self {
        Self { expected: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.expected.is_some()
    }
}

impl<S> Layer<S> for AcceptLayer {
    type Service = AcceptService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AcceptService {
            inner,
            expected: self.expected.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AcceptService<S> {
    inner: S,
    expected: Option<Arc<str>>,
}

impl<S> Service<Request<Body>> for AcceptService<S>
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
        if let Some(expected) = &self.expected
            && !accept_acceptable(req.headers().get(header::ACCEPT), expected)
        {
            debug!(
                method = %req.method(),
                accept = ?req.headers().get(header::ACCEPT),
                expected = %expected,
                "Client does not accept the response type"
            );
            metrics::record_negotiation_rejected("accept");
            let response = AppError::NotAcceptable(expected.to_string()).into_response();
            return Box::pin(async move { Ok(response) });
        }

        Box::pin(self.inner.call(req))
    }
}
