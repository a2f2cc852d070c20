//! Ambient stack shared by Bifrost binaries: structured error responses,
//! tracing/logging setup, and the token-bucket rate limiter.

pub mod error;
pub mod observability;
pub mod rate_limit;

pub use error::{ErrorDetail, ErrorResponse};
pub use rate_limit::{RateLimitConfig, RateLimitError, TokenBucketLimiter};
