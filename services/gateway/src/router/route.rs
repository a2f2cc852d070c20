use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use thiserror::Error;
use uuid::Uuid;

use super::matcher::CompiledMatcher;

/// Opaque, unique route identifier generated at `add_route` time (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteId(Uuid);

impl RouteId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for RouteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A fully composed, terminal pipeline for one route: middlewares wrapped
/// around the handler (spec §4.5 "Pipeline composition"). Boxed to keep the
/// route table generic over handler/middleware implementations, matching
/// the source's `http.Handler` functional composition (§9).
pub type SharedPipeline = Arc<
    dyn Fn(Request<Body>) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync,
>;

/// Compiled route, live in the route table (C1, spec §3 "Route").
pub struct Route {
    pub uid: RouteId,
    pub path: String,
    pub path_prefix: String,
    pub methods: Vec<String>,
    pub(crate) matcher: CompiledMatcher,
    pub handler: SharedPipeline,
    pub timeout: Option<Duration>,
}

impl Route {
    pub(crate) fn new(
        path: String,
        path_prefix: String,
        methods: Vec<String>,
        handler: SharedPipeline,
        timeout: Option<Duration>,
    ) -> Self {
        let matcher = CompiledMatcher::compile(&path_prefix, &path, &methods);
        Self {
            uid: RouteId::new(),
            path,
            path_prefix,
            methods,
            matcher,
            handler,
            timeout,
        }
    }

    /// `(pathPrefix, path)` identity used by the uniqueness invariant
    /// (spec §3, §4.1).
    pub fn identity(&self) -> (&str, &str) {
        (&self.path_prefix, &self.path)
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("uid", &self.uid)
            .field("path", &self.path)
            .field("path_prefix", &self.path_prefix)
            .field("methods", &self.methods)
            .finish()
    }
}

/// Per-request record attached by the router describing which route matched
/// and the extracted path variables (spec §3 "RouteContext").
#[derive(Debug, Clone)]
pub struct RouteContext {
    pub path: String,
    pub path_prefix: String,
    pub vars: HashMap<String, String>,
}

/// Errors surfaced by the dynamic router's mutating operations (spec §3
/// [ADDED], §4.3).
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("duplicate route for (pathPrefix={path_prefix:?}, path={path:?})")]
    DuplicateRoute { path_prefix: String, path: String },
    #[error("route not found: {0}")]
    RouteNotFound(RouteId),
}
