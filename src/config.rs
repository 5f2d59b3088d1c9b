//! Application configuration loaded from environment variables.
//!
//! # Configuration Hierarchy
//!
//! All configuration is loaded from environment variables with sensible defaults
//! for development. In production, configure via environment variables or a `.env` file.
//!
//! # Admission Control
//!
//! - `RATE_LIMIT_BURST`: Bucket capacity per client (default: 4)
//! - `RATE_LIMIT_RPS`: Sustained requests per second per client (default: 2.0)
//!
//! # Content Negotiation
//!
//! - `EXPECTED_CONTENT_TYPE`: Required request body type (default: `application/json`)
//! - `EXPECTED_ACCEPT`: Response type clients must accept (default: `application/json`)
//!
//! Setting either to an empty string disables that check.
//!
//! # Observability
//!
//! - `METRICS_PORT`: Prometheus listener port (default: 9090, 0 disables)
//!
//! `RUST_LOG` is not part of `Config`: the tracing subscriber reads it
//! directly, before configuration is loaded, so config errors are reported.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::limiter::{DEFAULT_BURST, DEFAULT_PER_SECOND, Quota};
use crate::server::DEFAULT_WRITE_TIMEOUT;

/// Default media type for both negotiation checks.
pub const DEFAULT_MEDIA_TYPE: &str = "application/json";

/// Application configuration loaded from environment variables.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.server_addr());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 3000)
    pub port: u16,

    /// Upper bound for producing a response on application routes (default: 10s)
    pub write_timeout: Duration,

    // =========================================================================
    // Rate Limiting Configuration
    // =========================================================================
    /// Burst capacity per client (default: 4)
    pub rate_limit_burst: u32,

    /// Sustained requests per second per client (default: 2.0)
    pub rate_limit_rps: f64,

    // =========================================================================
    // Content Negotiation Configuration
    // =========================================================================
    /// Expected request `Content-Type`; `None` disables the check
    pub expected_content_type: Option<String>,

    /// Expected `Accept` value; `None` disables the check
    pub expected_accept: Option<String>,

    // =========================================================================
    // Observability Configuration
    // =========================================================================
    /// Port for Prometheus metrics endpoint (default: 9090, 0 = disabled)
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if any configuration value is invalid
    /// (e.g., non-numeric PORT value, zero burst).
    pub fn from_env() -> AppResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// `lookup` returns the raw value of a variable, or `None` when unset.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            // Server
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: Self::parse_var(&lookup, "PORT", 3000)?,
            write_timeout: Duration::from_secs(Self::parse_var(
                &lookup,
                "WRITE_TIMEOUT_SECS",
                DEFAULT_WRITE_TIMEOUT.as_secs(),
            )?),

            // Rate limiting
            rate_limit_burst: Self::parse_var(&lookup, "RATE_LIMIT_BURST", DEFAULT_BURST)?,
            rate_limit_rps: Self::parse_var(&lookup, "RATE_LIMIT_RPS", DEFAULT_PER_SECOND)?,

            // Content negotiation
            expected_content_type: Self::media_type(&lookup, "EXPECTED_CONTENT_TYPE"),
            expected_accept: Self::media_type(&lookup, "EXPECTED_ACCEPT"),

            // Observability
            metrics_port: Self::parse_var(&lookup, "METRICS_PORT", 9090)?,
        };

        // Validate configuration before returning
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values for consistency and correctness.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if validation fails.
    pub fn validate(&self) -> AppResult<()> {
        if !self.rate_limit_rps.is_finite() || self.rate_limit_rps <= 0.0 {
            return Err(AppError::ConfigError(format!(
                "RATE_LIMIT_RPS must be a positive number, got {}",
                self.rate_limit_rps
            )));
        }

        if self.rate_limit_burst == 0 {
            return Err(AppError::ConfigError(
                "RATE_LIMIT_BURST must be greater than 0".to_string(),
            ));
        }

        if self.write_timeout.is_zero() {
            return Err(AppError::ConfigError(
                "WRITE_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Per-client admission quota.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` for a quota [`Config::validate`] would reject.
    pub fn quota(&self) -> AppResult<Quota> {
        Quota::new(self.rate_limit_burst, self.rate_limit_rps)
            .map_err(|e| AppError::ConfigError(e.to_string()))
    }

    /// Check if Prometheus metrics export is enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port > 0
    }

    /// Get the metrics endpoint address.
    ///
    /// Returns `None` if metrics are disabled (port = 0).
    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        if self.metrics_enabled() {
            Some(SocketAddr::from(([0, 0, 0, 0], self.metrics_port)))
        } else {
            None
        }
    }

    /// Parse a variable into the specified type with a default value.
    fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> AppResult<T>
    where
        F: Fn(&str) -> Option<String>,
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match lookup(name) {
            Some(val) => val
                .trim()
                .parse()
                .map_err(|e| AppError::ConfigError(format!("Invalid {name}: {e}"))),
            None => Ok(default),
        }
    }

    /// Media type for a negotiation check. Unset keeps the default, empty disables.
    fn media_type<F>(lookup: &F, name: &str) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup(name) {
            Some(val) => {
                let val = val.trim();
                (!val.is_empty()).then(|| val.to_string())
            }
            None => Some(DEFAULT_MEDIA_TYPE.to_string()),
        }
    }
}

/// Default configuration for testing and development.
///
/// Production deployments should use `Config::from_env()` instead.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Server
            host: "0.0.0.0".to_string(),
            port: 3000,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            // Rate limiting
            rate_limit_burst: DEFAULT_BURST,
            rate_limit_rps: DEFAULT_PER_SECOND,
            // Content negotiation
            expected_content_type: Some(DEFAULT_MEDIA_TYPE.to_string()),
            expected_accept: Some(DEFAULT_MEDIA_TYPE.to_string()),
            // Observability
            metrics_port: 9090,
        }
    }
}
