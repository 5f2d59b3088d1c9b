use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Standard 404 message.
pub const NOT_FOUND_MESSAGE: &str =
    "Hello, is it me you're looking for? Because the page you requested doesn't exist";

/// Standard 405 message.
pub const NOT_ALLOWED_MESSAGE: &str = "we don't do that here";

/// Standard 400 message.
pub const INVALID_REQUEST_MESSAGE: &str = "invalid request or payload";

/// Standard 415 message.
pub const UNSUPPORTED_MEDIA_MESSAGE: &str = "unsupported media type";

/// Application-wide error types with appropriate HTTP status codes.
///
/// Every short-circuit the middleware pipeline produces goes through this
/// type, so all rejections share one JSON body shape:
///
/// ```json
/// { "error": "rate_limited", "message": "Rate limit exceeded. Please retry later." }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Resource not found")]
    NotFound,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Not acceptable: {0}")]
    NotAcceptable(String),

    /// Client exceeded its admission quota.
    ///
    /// `retry_after_secs` and `limit` become the `Retry-After` and
    /// `X-RateLimit-Limit` response headers.
    #[error("Rate limit exceeded for {client}")]
    TooManyRequests {
        client: String,
        retry_after_secs: u64,
        limit: u32,
    },

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Error response body for API endpoints.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl AppError {
    /// HTTP status code this error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::NotAcceptable(_) => StatusCode::NOT_ACCEPTABLE,
            AppError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal(_) | AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Full details stay server-side; clients only get sanitized messages
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        self.to_response()
    }
}

impl AppError {
    /// Build the sanitized response without emitting a diagnostic.
    ///
    /// For callers that have already recorded the failure themselves.
    pub fn to_response(&self) -> Response {
        let status = self.status();
        let (error_type, message) = match self {
            AppError::NotFound => ("not_found", NOT_FOUND_MESSAGE.to_string()),
            AppError::MethodNotAllowed => ("method_not_allowed", NOT_ALLOWED_MESSAGE.to_string()),
            AppError::BadRequest(msg) if msg.is_empty() => {
                ("bad_request", INVALID_REQUEST_MESSAGE.to_string())
            }
            AppError::BadRequest(msg) => ("bad_request", msg.clone()),
            AppError::UnsupportedMediaType(_) => (
                "unsupported_media_type",
                UNSUPPORTED_MEDIA_MESSAGE.to_string(),
            ),
            AppError::NotAcceptable(expected) => (
                "not_acceptable",
                format!("this resource only produces {expected}"),
            ),
            AppError::TooManyRequests { .. } => (
                "rate_limited",
                "Rate limit exceeded. Please retry later.".to_string(),
            ),
            // Internal errors - never expose internal details to clients
            AppError::Internal(_) => (
                "internal_error",
                "An internal error occurred. Please contact support if the issue persists."
                    .to_string(),
            ),
            AppError::ConfigError(_) => (
                "config_error",
                "Service configuration error. Please contact support.".to_string(),
            ),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
        };

        let mut response = (status, axum::Json(body)).into_response();

        if let AppError::TooManyRequests {
            retry_after_secs,
            limit,
            ..
        } = self
        {
            let headers = response.headers_mut();
            headers.insert(header::RETRY_AFTER, HeaderValue::from(*retry_after_secs));
            headers.insert("x-ratelimit-limit", HeaderValue::from(*limit));
            headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        }

        response
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
