//! Registry mapping client identities to their limiters.
//!
//! The registry is an explicit object: build one per server and hand it to
//! the pipeline. It never evicts, so memory grows with the number of distinct
//! clients seen; the `http_rate_limit_clients` gauge tracks that size.

use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::{Allow, Quota, TokenBucketLimiter};
use crate::metrics;

/// Limiter handle shared between the registry and one admission check.
pub type SharedLimiter = Arc<dyn Allow>;

type LimiterFactory = Box<dyn Fn() -> SharedLimiter + Send + Sync>;

/// Identity used to partition rate-limit state: the peer host, port stripped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey(String);

impl ClientKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<IpAddr> for ClientKey {
    fn from(ip: IpAddr) -> Self {
        Self(ip.to_string())
    }
}

impl From<SocketAddr> for ClientKey {
    fn from(addr: SocketAddr) -> Self {
        Self::from(addr.ip())
    }
}

impl From<&str> for ClientKey {
    fn from(host: &str) -> Self {
        Self(host.to_string())
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Concurrency-safe, lazily populated map of per-client limiters.
pub struct LimiterRegistry {
    limiters: Mutex<HashMap<ClientKey, SharedLimiter>>,
    factory: LimiterFactory,
    quota: Quota,
}

impl LimiterRegistry {
    /// Registry creating a [`TokenBucketLimiter`] with `quota` for each new client.
    pub fn new(quota: Quota) -> Self {
        Self {
            limiters: Mutex::new(HashMap::new()),
            factory: Box::new(move || -> SharedLimiter {
                Arc::new(TokenBucketLimiter::with_quota(quota))
            }),
            quota,
        }
    }

    /// Registry creating limiters with a custom factory.
    ///
    /// `quota` is only used for the rate-limit response headers.
    pub fn with_factory<F>(quota: Quota, factory: F) -> Self
    where
        F: Fn() -> SharedLimiter + Send + Sync + 'static,
    {
        Self {
            limiters: Mutex::new(HashMap::new()),
            factory: Box::new(factory),
            quota,
        }
    }

    /// Return the limiter for `key`, creating it on first sight.
    ///
    /// The registry lock covers only the lookup-or-insert; callers run
    /// `allow()` on the returned handle after it is released.
    pub fn get_or_create(&self, key: &ClientKey) -> SharedLimiter {
        let mut limiters = self.limiters.lock();
        if let Some(limiter) = limiters.get(key) {
            return limiter.clone();
        }

        let limiter = (self.factory)();
        limiters.insert(key.clone(), limiter.clone());
        let tracked = limiters.len();
        drop(limiters);

        debug!(client = %key, tracked, "Created limiter for new client");
        metrics::set_rate_limit_clients(tracked);
        limiter
    }

    /// Install a specific limiter for `key`, replacing any existing one.
    pub fn insert(&self, key: ClientKey, limiter: SharedLimiter) {
        self.limiters.lock().insert(key, limiter);
    }

    pub fn contains(&self, key: &ClientKey) -> bool {
        self.limiters.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.limiters.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiters.lock().is_empty()
    }

    pub fn quota(&self) -> Quota {
        self.quota
    }
}

impl Default for LimiterRegistry {
    fn default() -> Self {
        Self::new(Quota::default())
    }
}

impl fmt::Debug for LimiterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LimiterRegistry")
            .field("clients", &self.len())
            .field("quota", &self.quota)
            .finish()
    }
}
