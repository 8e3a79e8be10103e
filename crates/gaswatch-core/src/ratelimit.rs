//! Ingress rate limiting for the registration endpoint
//!
//! Each client gets a token bucket of fixed capacity. Buckets refill
//! greedily: the whole capacity comes back at once every refill period,
//! counted from the moment the bucket was created. Buckets are never evicted,
//! which is fine for the small audience this endpoint serves.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

use crate::config::RateLimitConfig;

/// Key used when a request carries no client address header
pub const UNKNOWN_CLIENT: &str = "unknown";

/// A fixed-capacity bucket refilled in whole periods
#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: u32,
    refilled_at: Instant,
}

impl TokenBucket {
    fn new(capacity: u32, now: Instant) -> Self {
        Self {
            tokens: capacity,
            refilled_at: now,
        }
    }

    fn try_consume(&mut self, capacity: u32, period: Duration, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.refilled_at);
        if period.is_zero() {
            // No window: every request finds a full bucket
            self.refilled_at = now;
            self.tokens = capacity;
        } else if elapsed >= period {
            let periods = elapsed.as_nanos() / period.as_nanos();
            let advance = u32::try_from(periods)
                .ok()
                .and_then(|p| period.checked_mul(p))
                .unwrap_or(elapsed);
            self.refilled_at += advance;
            self.tokens = capacity;
        }

        if self.tokens == 0 {
            return false;
        }
        self.tokens -= 1;
        true
    }
}

/// Per-client token buckets guarding registration
pub struct IngressRateLimiter {
    capacity: u32,
    refill_period: Duration,
    buckets: DashMap<String, TokenBucket>,
}

impl IngressRateLimiter {
    /// Create a limiter granting `capacity` requests per `refill_period`
    pub fn new(capacity: u32, refill_period: Duration) -> Self {
        Self {
            capacity,
            refill_period,
            buckets: DashMap::new(),
        }
    }

    /// Create a limiter from configuration
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.capacity, config.refill_period)
    }

    /// Consume one token for `client_id`; `false` when the bucket is empty
    pub fn allow(&self, client_id: &str) -> bool {
        self.allow_at(client_id, Instant::now())
    }

    /// [`allow`](Self::allow) evaluated at an explicit instant
    pub fn allow_at(&self, client_id: &str, now: Instant) -> bool {
        // The entry guard holds the shard lock, so the first request from a
        // client creates exactly one bucket even under concurrent access.
        let mut bucket = self
            .buckets
            .entry(client_id.to_owned())
            .or_insert_with(|| TokenBucket::new(self.capacity, now));

        let allowed = bucket.try_consume(self.capacity, self.refill_period, now);
        if !allowed {
            debug!(client = client_id, "Rate limit bucket exhausted");
        }
        allowed
    }

    /// Number of clients seen so far
    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }
}

impl Default for IngressRateLimiter {
    fn default() -> Self {
        Self::from_config(&RateLimitConfig::default())
    }
}

/// Pick the rate limit key from proxy headers.
///
/// `X-Forwarded-For` wins over `X-Real-IP`; without either every caller
/// shares the [`UNKNOWN_CLIENT`] bucket.
pub fn client_key<'a>(forwarded_for: Option<&'a str>, real_ip: Option<&'a str>) -> &'a str {
    forwarded_for.or(real_ip).unwrap_or(UNKNOWN_CLIENT)
}
