//! Panic recovery middleware.
//!
//! The outermost layer of the pipeline. The entire downstream call, both the
//! synchronous `Service::call` and the returned future, runs inside an unwind
//! boundary. A panic anywhere below (rate limiting, negotiation, request
//! logging or the handler) is caught exactly once here, logged with its
//! message under the `panic` field, and answered with a generic 500.
//!
//! # Limitations
//!
//! A panic raised while the response body is being streamed happens after
//! this layer has already returned the response head, so it cannot be turned
//! into a clean 500.
//!
//! The boundary relies on unwinding; building with `panic = "abort"` would
//! terminate the process instead.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{HeaderValue, Request, Response, header};
use futures_util::FutureExt;
use tower::{Layer, Service};
use tracing::warn;

use super::ResponseFuture;
use crate::error::AppError;
use crate::log::Logger;
use crate::metrics;

/// Log message for recovered panics.
pub const PANIC_MESSAGE: &str = "panic recovered";

/// Field carrying the panic description.
pub const PANIC_FIELD: &str = "panic";

/// Panic recovery layer for Tower middleware stack.
#[derive(Clone)]
pub struct RecoveryLayer {
    logger: Arc<dyn Logger>,
}

impl RecoveryLayer {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self { logger }
    }
}

impl<S> Layer<S> for RecoveryLayer {
    type Service = RecoveryService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RecoveryService {
            inner,
            logger: self.logger.clone(),
        }
    }
}

/// Panic recovery service wrapper.
#[derive(Clone)]
pub struct RecoveryService<S> {
    inner: S,
    logger: Arc<dyn Logger>,
}

impl<S> Service<Request<Body>> for RecoveryService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = ResponseFuture<S::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let logger = self.logger.clone();
        // Take the service that poll_ready readied and leave a fresh clone behind
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let method = req.method().to_string();
        let uri = req.uri().to_string();

        Box::pin(async move {
            // inner.call runs inside the boundary too, not just its future
            let downstream = AssertUnwindSafe(async move { inner.call(req).await });

            match downstream.catch_unwind().await {
                Ok(result) => result,
                Err(payload) => {
                    let detail = panic_message(payload.as_ref());
                    metrics::record_panic_recovered();

                    if let Err(e) = logger.log(
                        PANIC_MESSAGE,
                        &[PANIC_FIELD, &detail, "method", &method, "uri", &uri],
                    ) {
                        warn!(error = %e, panic = %detail, "Failed to log recovered panic");
                    }

                    Ok(recovered_response(detail))
                }
            }
        })
    }
}

/// Human-readable description of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn recovered_response(detail: String) -> Response<Body> {
    // The panic is already on record through the logger
    let mut response = AppError::Internal(format!("panic: {detail}")).to_response();
    // The connection may be in an unknown state after a panic
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use axum::http::StatusCode;
    use tower::limit::ConcurrencyLimitLayer;
    use tower::{ServiceExt, service_fn};

    use super::*;
    use crate::log::MemoryLogger;

    fn request() -> Request<Body> {
        Request::builder()
            .uri("/irrelevant")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_passes_through_without_panic() {
        let logger = Arc::new(MemoryLogger::new());
        let handler = service_fn(|_req: Request<Body>| async {
            let mut res = Response::new(Body::empty());
            *res.status_mut() = StatusCode::CREATED;
            Ok::<_, std::convert::Infallible>(res)
        });
        let svc = RecoveryLayer::new(logger.clone()).layer(handler);

        let res = svc.oneshot(request()).await.unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        assert!(logger.is_empty());
    }

    #[tokio::test]
    async fn test_panic_in_future_returns_500() {
        let logger = Arc::new(MemoryLogger::new());
        let handler = service_fn(|_req: Request<Body>| async {
            if true {
                panic!("something happened");
            }
            Ok::<_, std::convert::Infallible>(Response::new(Body::empty()))
        });
        let svc = RecoveryLayer::new(logger.clone()).layer(handler);

        let res = svc.oneshot(request()).await.unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.headers().get(header::CONNECTION).unwrap(), "close");

        let records = logger.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, PANIC_MESSAGE);
        assert_eq!(records[0].field(PANIC_FIELD), Some("something happened"));
        assert_eq!(records[0].field("uri"), Some("/irrelevant"));
    }

    #[tokio::test]
    async fn test_panic_in_synchronous_call_returns_500() {
        #[derive(Clone)]
        struct PanicsOnCall;

        impl Service<Request<Body>> for PanicsOnCall {
            type Response = Response<Body>;
            type Error = std::convert::Infallible;
            type Future = std::future::Ready<Result<Response<Body>, Self::Error>>;

            fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
                Poll::Ready(Ok(()))
            }

            fn call(&mut self, _: Request<Body>) -> Self::Future {
                panic!("{}", String::from("boom in call"));
            }
        }

        let logger = Arc::new(MemoryLogger::new());
        let svc = RecoveryLayer::new(logger.clone()).layer(PanicsOnCall);

        let res = svc.oneshot(request()).await.unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            logger.records_with_field(PANIC_FIELD)[0].field(PANIC_FIELD),
            Some("boom in call")
        );
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_recovered_panic_is_not_repeated_in_diagnostics() {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer({
                let captured = captured.clone();
                move || captured.clone()
            })
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let logger = Arc::new(MemoryLogger::new());
        let handler = service_fn(|_req: Request<Body>| async {
            if true {
                panic!("secret detail");
            }
            Ok::<_, std::convert::Infallible>(Response::new(Body::empty()))
        });
        let res = RecoveryLayer::new(logger.clone())
            .layer(handler)
            .oneshot(request())
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(logger.len(), 1);
        let diagnostics = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(!diagnostics.contains("secret detail"), "{diagnostics}");
    }

    #[tokio::test]
    async fn test_readiness_carries_over_to_inner_service() {
        let logger = Arc::new(MemoryLogger::new());
        let handler = service_fn(|_req: Request<Body>| async {
            Ok::<_, std::convert::Infallible>(Response::new(Body::from("ok")))
        });
        let limited = ConcurrencyLimitLayer::new(1).layer(handler);
        let mut svc = RecoveryLayer::new(logger.clone()).layer(limited);

        for _ in 0..3 {
            let res = svc.ready().await.unwrap().call(request()).await.unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }
        assert!(logger.is_empty());
    }

    #[test]
    fn test_panic_message_payloads() {
        let static_str: Box<dyn Any + Send> = Box::new("static");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let other: Box<dyn Any + Send> = Box::new(42u32);

        assert_eq!(panic_message(static_str.as_ref()), "static");
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(other.as_ref()), "unknown panic payload");
    }
}
