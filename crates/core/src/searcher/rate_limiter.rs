//! Token bucket rate limiting per indexer.
//!
//! Buckets are created lazily from each descriptor's `rate_limit_rpm`; an
//! indexer without a limit is never throttled locally.

use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

use crate::indexer::IndexerDescriptor;

/// Rate limit status for an indexer.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitStatus {
    pub requests_per_minute: u32,
    pub tokens_available: f32,
    pub next_available_in_ms: Option<u64>,
}

/// Token bucket for a single indexer. Starts full.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f32,
    tokens: f32,
    /// Tokens added per second.
    refill_rate: f32,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(requests_per_minute: u32) -> Self {
        let capacity = requests_per_minute.max(1) as f32;
        Self {
            capacity,
            tokens: capacity,
            refill_rate: capacity / 60.0,
            last_refill: Instant::now(),
        }
    }

    /// Take one token, or report how long until one is available.
    pub fn try_acquire(&mut self) -> Result<(), Duration> {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            Err(self.wait_for_token())
        }
    }

    /// Change the rate, keeping current tokens clamped to the new capacity.
    pub fn set_rate_limit(&mut self, requests_per_minute: u32) {
        self.capacity = requests_per_minute.max(1) as f32;
        self.refill_rate = self.capacity / 60.0;
        self.tokens = self.tokens.min(self.capacity);
    }

    pub fn requests_per_minute(&self) -> u32 {
        self.capacity as u32
    }

    pub fn status(&mut self) -> RateLimitStatus {
        self.refill();
        RateLimitStatus {
            requests_per_minute: self.requests_per_minute(),
            tokens_available: self.tokens,
            next_available_in_ms: (self.tokens < 1.0)
                .then(|| self.wait_for_token().as_millis() as u64),
        }
    }

    fn wait_for_token(&self) -> Duration {
        Duration::from_secs_f32((1.0 - self.tokens) / self.refill_rate)
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f32();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }
}

/// Buckets keyed by indexer id.
#[derive(Debug, Default)]
pub struct RateLimiterPool {
    limiters: Mutex<HashMap<String, TokenBucket>>,
}

impl RateLimiterPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a token for `indexer`. `Err` carries the wait until the next one.
    ///
    /// A changed `rate_limit_rpm` is applied to the existing bucket; removing
    /// the limit drops the bucket.
    pub async fn try_acquire(&self, indexer: &IndexerDescriptor) -> Result<(), Duration> {
        let mut limiters = self.limiters.lock().await;
        let Some(rpm) = indexer.rate_limit_rpm.filter(|r| *r > 0) else {
            limiters.remove(&indexer.id);
            return Ok(());
        };

        let bucket = limiters
            .entry(indexer.id.clone())
            .or_insert_with(|| TokenBucket::new(rpm));
        if bucket.requests_per_minute() != rpm {
            bucket.set_rate_limit(rpm);
        }
        bucket.try_acquire()
    }

    pub async fn status(&self, indexer_id: &str) -> Option<RateLimitStatus> {
        let mut limiters = self.limiters.lock().await;
        limiters.get_mut(indexer_id).map(TokenBucket::status)
    }

    /// Status of every indexer that has been throttled at least once.
    pub async fn all_status(&self) -> Vec<(String, RateLimitStatus)> {
        let mut limiters = self.limiters.lock().await;
        let mut out: Vec<_> = limiters
            .iter_mut()
            .map(|(id, bucket)| (id.clone(), bucket.status()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}
