//! Per-client admission control.
//!
//! # Algorithm
//!
//! Each client gets its own continuous token bucket: tokens accumulate at
//! `per_second` up to `burst` and every admitted request consumes one. A fresh
//! client can therefore burst `burst` requests immediately and then sustain
//! `per_second` indefinitely.
//!
//! # Components
//!
//! - [`Allow`]: the single admission capability the middleware depends on
//! - [`TokenBucketLimiter`]: the production implementation
//! - [`LimiterRegistry`]: lazily creates one limiter per [`ClientKey`]

use std::fmt;

pub mod registry;
pub mod token_bucket;

pub use registry::{ClientKey, LimiterRegistry, SharedLimiter};
pub use token_bucket::{LimiterStats, TokenBucketLimiter};

/// Default burst capacity per client.
pub const DEFAULT_BURST: u32 = 4;

/// Default sustained rate per client (tokens per second).
pub const DEFAULT_PER_SECOND: f64 = 2.0;

/// Decides whether one more unit of work is admitted.
///
/// Implementations must be safe to call concurrently from many request tasks.
pub trait Allow: Send + Sync {
    fn allow(&self) -> bool;
}

/// Error type for rate limit configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateLimitError {
    /// Refill rate must be a positive, finite number.
    InvalidRate(f64),
    /// Burst must admit at least one request.
    ZeroBurst,
}

impl fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitError::InvalidRate(rate) => {
                write!(f, "refill rate must be positive and finite, got {rate}")
            }
            RateLimitError::ZeroBurst => write!(f, "burst must be at least 1"),
        }
    }
}

impl std::error::Error for RateLimitError {}

/// Bucket capacity and refill rate for one client.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quota {
    burst: u32,
    per_second: f64,
}

impl Quota {
    /// # Errors
    ///
    /// Returns [`RateLimitError`] if `burst` is zero or `per_second` is not a
    /// positive finite number.
    pub fn new(burst: u32, per_second: f64) -> Result<Self, RateLimitError> {
        if burst == 0 {
            return Err(RateLimitError::ZeroBurst);
        }
        if !per_second.is_finite() || per_second <= 0.0 {
            return Err(RateLimitError::InvalidRate(per_second));
        }
        Ok(Self { burst, per_second })
    }

    pub fn burst(&self) -> u32 {
        self.burst
    }

    pub fn per_second(&self) -> f64 {
        self.per_second
    }

    /// Whole seconds until a drained bucket admits again (at least 1).
    pub fn retry_after_secs(&self) -> u64 {
        (1.0 / self.per_second).ceil().max(1.0) as u64
    }
}

impl Default for Quota {
    fn default() -> Self {
        Self {
            burst: DEFAULT_BURST,
            per_second: DEFAULT_PER_SECOND,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_quota() {
        let quota = Quota::default();
        assert_eq!(quota.burst(), 4);
        assert_eq!(quota.per_second(), 2.0);
    }

    #[test]
    fn test_quota_validation() {
        assert!(matches!(Quota::new(0, 2.0), Err(RateLimitError::ZeroBurst)));
        assert!(matches!(
            Quota::new(4, 0.0),
            Err(RateLimitError::InvalidRate(_))
        ));
        assert!(matches!(
            Quota::new(4, -1.0),
            Err(RateLimitError::InvalidRate(_))
        ));
        assert!(matches!(
            Quota::new(4, f64::NAN),
            Err(RateLimitError::InvalidRate(_))
        ));
        assert!(Quota::new(1, 0.5).is_ok());
    }

    #[test]
    fn test_retry_after_rounds_up() {
        assert_eq!(Quota::new(4, 2.0).unwrap().retry_after_secs(), 1);
        assert_eq!(Quota::new(4, 0.5).unwrap().retry_after_secs(), 2);
        assert_eq!(Quota::new(4, 0.3).unwrap().retry_after_secs(), 4);
    }
}
