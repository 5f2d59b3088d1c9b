//! Ordered composition of the admission middleware.
//!
//! ```text
//! Recovery → RateLimit → ContentType → Accept → RequestLog → application
//! ```
//!
//! Order matters. Recovery sits outermost so a panic in any later layer or in
//! the application is caught. Rate limiting runs before negotiation so
//! rejected media types still consume admission tokens, and request logging
//! only sees requests that passed every check.
//!
//! `ServiceBuilder` wraps in the order layers are added: the first layer added
//! is the outermost.

use std::sync::Arc;

use axum::Router;
use tower::ServiceBuilder;
use tower::layer::util::{Identity, Stack};

use crate::config::Config;
use crate::error::AppResult;
use crate::limiter::LimiterRegistry;
use crate::log::Logger;
use crate::middleware::{
    AcceptLayer, ContentTypeLayer, RateLimitLayer, RecoveryLayer, RequestLogLayer,
};

/// The composed middleware stack, outermost layer innermost in the type.
pub type PipelineLayer = ServiceBuilder<
    Stack<
        RequestLogLayer,
        Stack<
            AcceptLayer,
            Stack<ContentTypeLayer, Stack<RateLimitLayer, Stack<RecoveryLayer, Identity>>>,
        >,
    >,
>;

/// Builder for the admission pipeline.
///
/// # Example
///
/// ```rust,ignore
/// let registry = Arc::new(LimiterRegistry::default());
/// let app = Pipeline::new(Arc::new(JsonLogger::stdout()), registry)
///     .content_type("application/json")
///     .accept("application/json")
///     .apply(Router::new().route("/health", get(health)));
/// ```
#[derive(Clone)]
pub struct Pipeline {
    logger: Arc<dyn Logger>,
    registry: Arc<LimiterRegistry>,
    content_type: ContentTypeLayer,
    accept: AcceptLayer,
}

impl Pipeline {
    /// Pipeline with both negotiation checks disabled.
    pub fn new(logger: Arc<dyn Logger>, registry: Arc<LimiterRegistry>) -> Self {
        Self {
            logger,
            registry,
            content_type: ContentTypeLayer::disabled(),
            accept: AcceptLayer::disabled(),
        }
    }

    /// Pipeline configured from [`Config`], with a fresh registry for its quota.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` when the configured quota is invalid.
    pub fn from_config(config: &Config, logger: Arc<dyn Logger>) -> AppResult<Self> {
        let registry = Arc::new(LimiterRegistry::new(config.quota()?));
        let mut pipeline = Self::new(logger, registry);
        if let Some(expected) = &config.expected_content_type {
            pipeline = pipeline.content_type(expected.as_str());
        }
        if let Some(expected) = &config.expected_accept {
            pipeline = pipeline.accept(expected.as_str());
        }
        Ok(pipeline)
    }

    /// Require this `Content-Type` on requests that carry a body.
    pub fn content_type(mut self, expected: impl Into<Arc<str>>) -> Self {
        self.content_type = ContentTypeLayer::new(expected);
        self
    }

    /// Require clients to accept this media type.
    pub fn accept(mut self, expected: impl Into<Arc<str>>) -> Self {
        self.accept = AcceptLayer::new(expected);
        self
    }

    /// Registry shared by every request passing through this pipeline.
    pub fn registry(&self) -> &Arc<LimiterRegistry> {
        &self.registry
    }

    /// Build the ordered layer stack.
    pub fn into_layer(self) -> PipelineLayer {
        ServiceBuilder::new()
            .layer(RecoveryLayer::new(self.logger.clone()))
            .layer(RateLimitLayer::new(self.registry))
            .layer(self.content_type)
            .layer(self.accept)
            .layer(RequestLogLayer::new(self.logger))
    }

    /// Wrap every route of `router`, fallbacks included, in the pipeline.
    pub fn apply<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.layer(self.into_layer())
    }
}
