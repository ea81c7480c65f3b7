//! Per-identity token-bucket rate limiting
//!
//! An explicitly-constructed, injectable component rather than ambient
//! middleware state. Purely per-process: its job is abuse damping, not
//! hard quota enforcement across replicas.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

struct Bucket {
    tokens: f64,
    seen: Instant,
}

/// Token buckets keyed by identity, with lazy eviction of idle entries.
pub struct RateLimiter {
    buckets: DashMap<String, Bucket>,
    rate: f64,
    burst: f64,
    idle_expiry: Duration,
    last_sweep: Mutex<Instant>,
}

impl RateLimiter {
    /// `rate` tokens per second refill, up to `burst` capacity; buckets
    /// untouched for `idle_expiry` are evicted.
    pub fn new(rate: f64, burst: f64, idle_expiry: Duration) -> Self {
        Self {
            buckets: DashMap::new(),
            rate,
            burst,
            idle_expiry,
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    /// Take one token for `key`; `false` means the request is rejected.
    pub fn allow(&self, key: &str) -> bool {
        let now = Instant::now();
        self.maybe_sweep(now);
        let mut entry = self.buckets.entry(key.to_string()).or_insert_with(|| Bucket {
            tokens: self.burst,
            seen: now,
        });
        let bucket = entry.value_mut();
        let elapsed = now.saturating_duration_since(bucket.seen).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rate).min(self.burst);
        bucket.seen = now;
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Sweep idle buckets at most once per expiry interval, piggybacked
    /// on request handling so no background task is needed.
    fn maybe_sweep(&self, now: Instant) {
        {
            let mut last = self.last_sweep.lock();
            if now.saturating_duration_since(*last) < self.idle_expiry {
                return;
            }
            *last = now;
        }
        let expiry = self.idle_expiry;
        self.buckets
            .retain(|_, bucket| now.saturating_duration_since(bucket.seen) < expiry);
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.buckets.len()
    }
}
