//! Response bodies of the demo application.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service health status
    pub status: String,
    /// Service version
    pub version: String,
    /// Current timestamp
    pub timestamp: DateTime<Utc>,
}

/// Echo response: the parsed request document and its size.
#[derive(Debug, Serialize)]
pub struct EchoResponse {
    pub echo: serde_json::Value,
    pub bytes: usize,
}
