//! Continuous token bucket for a single client.

use parking_lot::Mutex;
use tokio::time::Instant;

use super::{Allow, Quota};

/// Admission counters for one limiter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LimiterStats {
    /// Number of `allow()` calls evaluated.
    pub evaluations: u64,
    /// Number of those calls that were admitted.
    pub admitted: u64,
}

/// Mutable bucket state, protected by a Mutex.
#[derive(Debug)]
struct BucketState {
    /// Fractional so refill is smooth between whole tokens
    tokens: f64,
    last_refill: Instant,
    stats: LimiterStats,
}

/// Token bucket admission controller.
///
/// The bucket starts full. Time comes from `tokio::time::Instant`, which
/// follows the real clock unless a test pauses the runtime clock.
#[derive(Debug)]
pub struct TokenBucketLimiter {
    capacity: f64,
    refill_rate: f64,
    state: Mutex<BucketState>,
}

impl TokenBucketLimiter {
    /// Create a limiter holding at most `capacity` tokens and gaining
    /// `refill_rate` tokens per second.
    pub fn new(capacity: u32, refill_rate: f64) -> Self {
        let capacity = f64::from(capacity);
        Self {
            capacity,
            refill_rate,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
                stats: LimiterStats::default(),
            }),
        }
    }

    pub fn with_quota(quota: Quota) -> Self {
        Self::new(quota.burst(), quota.per_second())
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(state.last_refill);
        state.tokens = (state.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity);
        state.last_refill = now;
    }

    /// Tokens currently available, after applying any pending refill.
    pub fn available_tokens(&self) -> f64 {
        let mut state = self.state.lock();
        self.refill(&mut state);
        state.tokens
    }

    pub fn stats(&self) -> LimiterStats {
        self.state.lock().stats
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }
}

impl Default for TokenBucketLimiter {
    fn default() -> Self {
        Self::with_quota(Quota::default())
    }
}

impl Allow for TokenBucketLimiter {
    fn allow(&self) -> bool {
        let mut state = self.state.lock();
        self.refill(&mut state);
        state.stats.evaluations += 1;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            state.stats.admitted += 1;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_reject() {
        let limiter = TokenBucketLimiter::default();

        for _ in 0..4 {
            assert!(limiter.allow());
        }
        assert!(!limiter.allow());

        let stats = limiter.stats();
        assert_eq!(stats.evaluations, 5);
        assert_eq!(stats.admitted, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_admits_exactly_one() {
        let limiter = TokenBucketLimiter::default();
        while limiter.allow() {}

        // 1 / refill_rate seconds buys back exactly one token
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(limiter.allow());
        assert!(!limiter.allow());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_caps_at_capacity() {
        let limiter = TokenBucketLimiter::new(4, 2.0);
        assert!(limiter.allow());

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(limiter.available_tokens(), 4.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_refill_does_not_admit() {
        let limiter = TokenBucketLimiter::new(1, 2.0);
        assert!(limiter.allow());

        tokio::time::advance(Duration::from_millis(250)).await;
        assert!(!limiter.allow());
        let tokens = limiter.available_tokens();
        assert!((tokens - 0.5).abs() < 1e-9, "tokens = {tokens}");
    }

    #[test]
    fn test_tokens_never_negative() {
        let limiter = TokenBucketLimiter::new(2, 0.001);
        for _ in 0..10 {
            limiter.allow();
        }
        assert!(limiter.available_tokens() >= 0.0);
    }

    #[test]
    fn test_concurrent_allow_never_exceeds_capacity() {
        // Refill is negligible over the test's lifetime
        let limiter = Arc::new(TokenBucketLimiter::new(50, 0.000_001));
        let admitted = Arc::new(AtomicU64::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                let admitted = admitted.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        if limiter.allow() {
                            admitted.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(admitted.load(Ordering::SeqCst), 50);
        let stats = limiter.stats();
        assert_eq!(stats.evaluations, 800);
        assert_eq!(stats.admitted, 50);
    }
}
