//! Rate limiting middleware using the token bucket algorithm.
//!
//! # Algorithm
//!
//! Every client (peer IP, port stripped) owns a continuous token bucket held
//! in the shared [`LimiterRegistry`]:
//!
//! - Burst up to `burst` requests immediately
//! - Sustain `per_second` requests afterwards
//! - Per-client state, so one noisy client cannot starve the others
//!
//! # Configuration
//!
//! - `rate_limit_burst`: Bucket capacity per client (default: 4)
//! - `rate_limit_rps`: Refill rate per client (default: 2.0)
//!
//! # Response Headers
//!
//! On rate limit exceeded (429):
//! - `Retry-After`: Seconds until a drained bucket admits again
//! - `X-RateLimit-Limit`: Configured burst
//! - `X-RateLimit-Remaining`: Always `0`
//!
//! # Fail Closed
//!
//! When the peer address is missing the request is answered with 500 rather
//! than passed through unmetered.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, Response};
use axum::response::IntoResponse;
use tower::{Layer, Service};
use tracing::{error, warn};

use super::ResponseFuture;
use super::peer::client_key;
use crate::error::AppError;
use crate::limiter::LimiterRegistry;
use crate::metrics;

/// Rate limiting layer for Tower middleware stack.
///
/// # Example
///
/// ```rust,ignore
/// let registry = Arc::new(LimiterRegistry::new(Quota::new(4, 2.0)?));
/// let app = Router::new()
///     .route("/api", get(handler))
///     .layer(RateLimitLayer::new(registry));
/// ```
#[derive(Clone)]
pub struct RateLimitLayer {
    registry: Arc<LimiterRegistry>,
}

impl RateLimitLayer {
    pub fn new(registry: Arc<LimiterRegistry>) -> Self {
        Self { registry }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            registry: self.registry.clone(),
        }
    }
}

/// Rate limiting service wrapper.
#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    registry: Arc<LimiterRegistry>,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
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
        let Some(key) = client_key(&req) else {
            error!(
                uri = %req.uri(),
                "Client address unavailable, rejecting request (rate limiting fails closed)"
            );
            let response =
                AppError::Internal("client address unavailable".to_string()).into_response();
            return Box::pin(async move { Ok(response) });
        };

        // Registry lock is released before the admission decision
        let limiter = self.registry.get_or_create(&key);
        if limiter.allow() {
            return Box::pin(self.inner.call(req));
        }

        let quota = self.registry.quota();
        let retry_after_secs = quota.retry_after_secs();
        metrics::record_rate_limited();
        warn!(
            client_ip = %key,
            path = %req.uri().path(),
            retry_after_secs,
            "Rate limit exceeded for IP"
        );

        let response = AppError::TooManyRequests {
            client: key.to_string(),
            retry_after_secs,
            limit: quota.burst(),
        }
        .into_response();
        Box::pin(async move { Ok(response) })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::extract::ConnectInfo;
    use axum::http::{StatusCode, header};
    use tower::{ServiceExt, service_fn};

    use super::*;
    use crate::limiter::{Allow, ClientKey};

    /// Admits `max` requests, then rejects.
    struct MockLimiter {
        max: usize,
        current: AtomicUsize,
    }

    impl MockLimiter {
        fn new(current: usize, max: usize) -> Self {
            Self {
                max,
                current: AtomicUsize::new(current),
            }
        }
    }

    impl Allow for MockLimiter {
        fn allow(&self) -> bool {
            self.current
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| {
                    (c < self.max).then_some(c + 1)
                })
                .is_ok()
        }
    }

    fn request_from(addr: &str) -> Request<Body> {
        let mut req = Request::builder()
            .uri("/irrelevant")
            .body(Body::empty())
            .unwrap();
        let addr: SocketAddr = addr.parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        req
    }

    fn service(
        registry: Arc<LimiterRegistry>,
    ) -> impl Service<Request<Body>, Response = Response<Body>, Error = std::convert::Infallible>
    + Clone {
        RateLimitLayer::new(registry).layer(service_fn(|_req: Request<Body>| async {
            let mut res = Response::new(Body::empty());
            *res.status_mut() = StatusCode::NOT_FOUND;
            Ok::<_, std::convert::Infallible>(res)
        }))
    }

    #[tokio::test]
    async fn test_new_request_generates_new_client() {
        let registry = Arc::new(LimiterRegistry::default());
        let res = service(registry.clone())
            .oneshot(request_from("127.0.0.1:3000"))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_different_ips_generate_different_clients() {
        let registry = Arc::new(LimiterRegistry::default());
        service(registry.clone())
            .oneshot(request_from("127.0.0.1:3000"))
            .await
            .unwrap();
        service(registry.clone())
            .oneshot(request_from("127.0.0.2:3000"))
            .await
            .unwrap();

        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_known_source_uses_existing_client() {
        let registry = Arc::new(LimiterRegistry::default());
        let limiter = Arc::new(MockLimiter::new(0, 1));
        registry.insert(ClientKey::from("127.0.0.1"), limiter.clone());

        service(registry.clone())
            .oneshot(request_from("127.0.0.1:3000"))
            .await
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(limiter.current.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_returns_429_when_exhausted() {
        let registry = Arc::new(LimiterRegistry::default());
        registry.insert(ClientKey::from("127.0.0.1"), Arc::new(MockLimiter::new(2, 2)));

        let res = service(registry.clone())
            .oneshot(request_from("127.0.0.1:3000"))
            .await
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(res.headers().get(header::RETRY_AFTER).unwrap(), "1");
        assert_eq!(res.headers().get("x-ratelimit-limit").unwrap(), "4");
    }

    #[tokio::test]
    async fn test_missing_address_fails_closed() {
        let registry = Arc::new(LimiterRegistry::default());
        let req = Request::builder().body(Body::empty()).unwrap();

        let res = service(registry.clone()).oneshot(req).await.unwrap();

        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_quota_burst_then_429() {
        let registry = Arc::new(LimiterRegistry::default());
        let svc = service(registry);

        for _ in 0..4 {
            let res = svc
                .clone()
                .oneshot(request_from("10.0.0.7:1234"))
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::NOT_FOUND);
        }
        let res = svc.oneshot(request_from("10.0.0.7:1234")).await.unwrap();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
