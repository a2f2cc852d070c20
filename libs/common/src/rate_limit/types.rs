use serde::{Deserialize, Serialize};

/// Default token-bucket fill rate and burst size (requests/second), per spec §4.9.
pub const DEFAULT_RATE: u32 = 5000;
/// Upper bound a route is allowed to configure.
pub const MAX_RATE: u32 = 10000;

/// Per-route token-bucket configuration.
///
/// `rate` tokens are added per second, up to `burst` tokens held at once;
/// one token is spent per request. The spec sets burst equal to rate by
/// default — a pure requests/second cap with no extra burst allowance.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate")]
    pub rate: u32,
    #[serde(default = "default_burst")]
    pub burst: u32,
}

fn default_rate() -> u32 {
    DEFAULT_RATE
}

fn default_burst() -> u32 {
    DEFAULT_RATE
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            rate: default_rate(),
            burst: default_burst(),
        }
    }
}

impl RateLimitConfig {
    /// Clamp `rate`/`burst` to `MAX_RATE`.
    pub fn clamped(mut self) -> Self {
        self.rate = self.rate.min(MAX_RATE);
        self.burst = self.burst.min(MAX_RATE);
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("rate limit exceeded: {limit} requests/second")]
    Exceeded { limit: u32, remaining: u32 },
}

/// Snapshot of a bucket's state for `X-Rate-Limit-*` response headers.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitSnapshot {
    pub limit: u32,
    pub remaining: u32,
    pub reset_seconds: u64,
}
