//! Standardized error response shape shared across gateway middlewares
//! and handlers.

mod trace;
mod types;

pub use trace::generate_trace_id;
pub use types::{ErrorDetail, ErrorResponse};

#[cfg(feature = "http")]
pub use trace::extract_trace_id_from_http;
