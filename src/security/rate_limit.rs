//! Per-namespace request rate limiting.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tokio::time::Instant;

use crate::config::RateLimitConfig;
use crate::observability::metrics;

/// A simple token bucket rate limiter.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        // Refill tokens
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// One bucket per namespace, holding a minute's worth of requests.
#[derive(Debug)]
pub struct NamespaceRateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    enabled: bool,
    capacity: f64,
    refill_per_sec: f64,
}

impl NamespaceRateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let per_minute = config.requests_per_minute.max(1) as f64;
        Self {
            buckets: Mutex::new(HashMap::new()),
            enabled: config.enabled,
            capacity: per_minute,
            refill_per_sec: per_minute / 60.0,
        }
    }

    /// Take one request slot for `namespace`.
    pub fn check(&self, namespace: &str) -> bool {
        if !self.enabled {
            return true;
        }

        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        let bucket = buckets
            .entry(namespace.to_string())
            .or_insert_with(|| TokenBucket::new(self.capacity));

        let allowed = bucket.try_acquire(self.capacity, self.refill_per_sec);
        if !allowed {
            tracing::warn!(namespace = %namespace, "Rate limit exceeded");
            metrics::record_rate_limited(namespace);
        }
        allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn limiter(rpm: u32) -> NamespaceRateLimiter {
        NamespaceRateLimiter::new(&RateLimitConfig {
            enabled: true,
            requests_per_minute: rpm,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_bucket_drains_and_refills() {
        let limiter = limiter(60);
        for _ in 0..60 {
            assert!(limiter.check("team-x"));
        }
        assert!(!limiter.check("team-x"));

        // 60 per minute refills one token per second.
        tokio::time::advance(Duration::from_millis(1_100)).await;
        assert!(limiter.check("team-x"));
        assert!(!limiter.check("team-x"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_namespaces_are_independent() {
        let limiter = limiter(2);
        assert!(limiter.check("team-a"));
        assert!(limiter.check("team-a"));
        assert!(!limiter.check("team-a"));
        assert!(limiter.check("team-b"));
    }

    #[tokio::test]
    async fn test_disabled_limiter_allows_everything() {
        let limiter = NamespaceRateLimiter::new(&RateLimitConfig {
            enabled: false,
            requests_per_minute: 1,
        });
        for _ in 0..10 {
            assert!(limiter.check("team-x"));
        }
    }
}
