//! Fallback handlers for unmatched paths and methods.

use crate::error::AppError;

/// Handler for paths no route matches.
pub async fn not_found() -> AppError {
    AppError::NotFound
}

/// Handler for known paths requested with an unsupported method.
pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    use super::*;

    #[tokio::test]
    async fn test_fallback_statuses() {
        assert_eq!(not_found().await.into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(
            method_not_allowed().await.into_response().status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
    }
}
