//! Client-side rate limiting for rate-limited upstreams
//!
//! Token bucket in front of the public CoinGecko API. Instead of rejecting a call
//! when the bucket is empty, [`RateLimiter::acquire`] waits until a token refills.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Token bucket rate limiter
#[derive(Debug)]
pub struct TokenBucket {
    /// Maximum tokens (requests) held at once
    capacity: u32,
    /// Current available tokens
    tokens: f64,
    /// Tokens added per second
    refill_rate: f64,
    /// Last refill time
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(capacity: u32, refill_per_second: f64) -> Self {
        Self {
            capacity,
            tokens: capacity as f64,
            refill_rate: refill_per_second,
            last_refill: Instant::now(),
        }
    }

    /// Bucket refilling `requests` tokens per minute
    pub fn per_minute(requests: u32) -> Self {
        Self::new(requests, requests as f64 / 60.0)
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * self.refill_rate)
            .min(self.capacity as f64);
        self.last_refill = now;
    }

    /// Try to consume a token, returns true if allowed
    pub fn try_acquire(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Get time until a token will be available
    pub fn time_until_available(&self) -> Duration {
        if self.tokens >= 1.0 || self.refill_rate <= 0.0 {
            Duration::ZERO
        } else {
            let tokens_needed = 1.0 - self.tokens;
            Duration::from_secs_f64(tokens_needed / self.refill_rate)
        }
    }
}

/// Shared limiter used by one adapter
#[derive(Debug)]
pub struct RateLimiter {
    name: &'static str,
    bucket: Mutex<TokenBucket>,
}

impl RateLimiter {
    pub fn new(name: &'static str, bucket: TokenBucket) -> Self {
        Self {
            name,
            bucket: Mutex::new(bucket),
        }
    }

    /// Wait until a token is available, then consume it
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock();
                if bucket.try_acquire() {
                    return;
                }
                bucket.time_until_available()
            };
            debug!("{} rate limit reached, waiting {:?}", self.name, wait);
            tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
        }
    }
}
