use lru::LruCache;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use super::types::{RateLimitConfig, RateLimitError, RateLimitSnapshot};

/// A single token bucket: `tokens` grows by `config.rate` per elapsed second,
/// capped at `config.burst`, and is spent one-per-request.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
    config: RateLimitConfig,
}

impl TokenBucket {
    fn new(config: RateLimitConfig, now: Instant) -> Self {
        Self {
            tokens: config.burst as f64,
            last_refill: now,
            config,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            let cap = self.config.burst as f64;
            self.tokens = (self.tokens + elapsed * self.config.rate as f64).min(cap);
            self.last_refill = now;
        }
    }

    fn try_acquire(&mut self, now: Instant) -> Result<RateLimitSnapshot, RateLimitError> {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(self.snapshot())
        } else {
            let remaining = self.tokens.floor().max(0.0) as u32;
            Err(RateLimitError::Exceeded {
                limit: self.config.rate,
                remaining,
            })
        }
    }

    fn snapshot(&self) -> RateLimitSnapshot {
        let remaining = self.tokens.floor().max(0.0) as u32;
        let deficit = (self.config.rate as f64 - self.tokens).max(0.0);
        let reset_seconds = if self.config.rate == 0 {
            0
        } else {
            (deficit / self.config.rate as f64).ceil() as u64
        };
        RateLimitSnapshot {
            limit: self.config.rate,
            remaining,
            reset_seconds,
        }
    }
}

/// Token-bucket rate limiter keyed by an arbitrary key (route id, client id, ...),
/// bounded by an LRU cache so memory use stays flat regardless of key cardinality.
#[derive(Clone)]
pub struct TokenBucketLimiter<K: Hash + Eq + Clone> {
    store: Arc<RwLock<LruCache<K, TokenBucket>>>,
    default_config: RateLimitConfig,
}

impl<K: Hash + Eq + Clone> TokenBucketLimiter<K> {
    /// `max_keys` bounds the number of distinct buckets held at once.
    pub fn new(default_config: RateLimitConfig, max_keys: usize) -> Self {
        let capacity = NonZeroUsize::new(max_keys).expect("max_keys must be non-zero");
        Self {
            store: Arc::new(RwLock::new(LruCache::new(capacity))),
            default_config: default_config.clamped(),
        }
    }

    /// Acquire one token for `key`, lazily creating its bucket with `config`
    /// (falling back to the limiter's default) on first use.
    pub async fn acquire(
        &self,
        key: K,
        config: Option<RateLimitConfig>,
    ) -> Result<RateLimitSnapshot, RateLimitError> {
        let now = Instant::now();
        let mut store = self.store.write().await;

        if !store.contains(&key) {
            let cfg = config.unwrap_or(self.default_config).clamped();
            store.put(key.clone(), TokenBucket::new(cfg, now));
        }

        let bucket = store.get_mut(&key).expect("bucket present after put");
        bucket.try_acquire(now)
    }

    /// Current number of distinct keys tracked (for diagnostics).
    pub async fn tracked_keys_count(&self) -> usize {
        self.store.read().await.len()
    }
}
