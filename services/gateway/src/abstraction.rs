//! Small cross-cutting constants shared by handlers and middlewares,
//! grounded on the source's `abstraction` package.

/// Header used to forward the authenticated subject to the upstream
/// service (source: `abstraction.HttpUserIdHeader`).
pub const HTTP_USER_ID_HEADER: &str = "X-User-Id";
