//! Token bucket request pacing owned by a single adapter.
//!
//! Upstreams with published quotas (Alpha Vantage free tier) or archive
//! endpoints that block bursty clients (NSE, BSE) pace their own outgoing
//! requests through a `Throttle`.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, warn};

#[derive(Debug)]
struct TokenBucket {
    /// Current number of available tokens.
    tokens: f64,
    /// Last time the bucket was updated.
    last_update: Instant,
    /// Token refill rate (tokens per second).
    rate: f64,
    /// Maximum bucket capacity.
    capacity: f64,
}

impl TokenBucket {
    fn new(requests_per_minute: u32, capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
            rate: f64::from(requests_per_minute.max(1)) / 60.0,
            capacity,
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last_update = now;
    }

    fn try_acquire(&mut self) -> bool {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn time_until_available(&mut self) -> Duration {
        self.refill();

        if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - self.tokens) / self.rate)
        }
    }
}

/// Request pacer for one upstream.
#[derive(Debug)]
pub struct Throttle {
    name: &'static str,
    bucket: Mutex<TokenBucket>,
}

impl Throttle {
    /// Allow `requests_per_minute` on average with bursts up to `burst`.
    pub fn new(name: &'static str, requests_per_minute: u32, burst: u32) -> Self {
        Self {
            name,
            bucket: Mutex::new(TokenBucket::new(requests_per_minute, f64::from(burst.max(1)))),
        }
    }

    /// Lock the bucket, recovering from poison.
    fn lock_bucket(&self) -> MutexGuard<'_, TokenBucket> {
        self.bucket.lock().unwrap_or_else(|poisoned| {
            warn!("Throttle '{}' mutex was poisoned, recovering", self.name);
            poisoned.into_inner()
        })
    }

    /// Wait until a request may be sent.
    pub async fn acquire(&self) {
        loop {
            let wait_time = {
                let mut bucket = self.lock_bucket();
                if bucket.try_acquire() {
                    return;
                }
                bucket.time_until_available()
            };

            if wait_time > Duration::ZERO {
                debug!("Throttle '{}': waiting {:?}", self.name, wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }
    }

    /// Take a token without waiting.
    #[cfg(test)]
    fn try_acquire(&self) -> bool {
        self.lock_bucket().try_acquire()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_drains_to_capacity() {
        let mut bucket = TokenBucket::new(60, 3.0);

        for _ in 0..3 {
            assert!(bucket.try_acquire());
        }
        assert!(!bucket.try_acquire());
    }

    #[test]
    fn test_bucket_refill() {
        let mut bucket = TokenBucket::new(60, 1.0); // 1 token/second

        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());

        bucket.last_update = Instant::now() - Duration::from_secs(2);

        assert!(bucket.try_acquire());
    }

    #[test]
    fn test_throttle_try_acquire() {
        let throttle = Throttle::new("test", 5, 2);
        assert!(throttle.try_acquire());
        assert!(throttle.try_acquire());
        assert!(!throttle.try_acquire());
    }

    #[tokio::test]
    async fn test_acquire_waits_for_refill() {
        let throttle = Throttle::new("fast", 6000, 1); // 100/second

        throttle.acquire().await;

        let start = Instant::now();
        throttle.acquire().await;
        assert!(start.elapsed().as_millis() >= 5);
    }
}
