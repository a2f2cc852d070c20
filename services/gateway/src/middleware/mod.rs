//! Cross-cutting middlewares: auth (C8), CORS/recovery/rate-limit (C9).

pub mod auth;
pub mod cors;
pub mod rate_limit;
pub mod recovery;
