//! JSON echo endpoint.
//!
//! - `POST /echo` - Returns the submitted JSON document with its size
//!
//! The body is read as raw bytes and parsed here rather than through the
//! `Json` extractor: media type enforcement belongs to the pipeline, and a
//! malformed document should produce the standard 400 body.

use axum::Json;
use axum::body::Bytes;
use tracing::{debug, instrument};

use crate::error::{AppError, AppResult};
use crate::models::EchoResponse;

/// Echo a JSON document back to the caller.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for an empty or malformed body.
#[instrument(skip(body), fields(bytes = body.len()))]
pub async fn echo(body: Bytes) -> AppResult<Json<EchoResponse>> {
    let echo = serde_json::from_slice(&body).map_err(|e| {
        debug!(error = %e, "Rejecting malformed JSON body");
        AppError::BadRequest(String::new())
    })?;

    Ok(Json(EchoResponse {
        echo,
        bytes: body.len(),
    }))
}
