//! Dynamic router (C3): owns the route table (C1) and dispatches requests
//! to the first matching route's pipeline (spec §4.3).

mod matcher;
mod pattern;
mod route;
mod table;

pub use route::{Route, RouteContext, RouteId, RouterError, SharedPipeline};
pub use table::RouteTable;

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

pub struct DynamicRouter {
    table: RouteTable,
}

impl DynamicRouter {
    pub fn new() -> Self {
        Self {
            table: RouteTable::new(),
        }
    }

    /// Register a new route. Rejects a duplicate `(pathPrefix, path)` pair
    /// (spec §4.1 uniqueness invariant, §4.3 `RouterError::DuplicateRoute`).
    pub async fn add_route(
        &self,
        path: String,
        path_prefix: String,
        methods: Vec<String>,
        handler: SharedPipeline,
        timeout: Option<Duration>,
    ) -> Result<RouteId, RouterError> {
        let snapshot = self.table.snapshot();
        if snapshot
            .values()
            .any(|existing| existing.identity() == (path_prefix.as_str(), path.as_str()))
        {
            return Err(RouterError::DuplicateRoute { path_prefix, path });
        }

        let route = Route::new(path, path_prefix, methods, handler, timeout);
        let id = route.uid;
        self.table.store(route).await;
        Ok(id)
    }

    /// Remove a route by id. Idempotent: removing an id that doesn't exist
    /// (already removed, or never registered) just logs and returns
    /// (spec §4.3 "removeRoute is idempotent").
    pub async fn remove_route(&self, id: RouteId) {
        if self.table.delete(id).await.is_none() {
            debug!(route_id = %id, "remove_route: no route with this id, ignoring");
        }
    }

    /// Dispatch `request` to the first route whose matcher matches, in
    /// snapshot iteration order. The matched route's `Arc<Route>` is cloned
    /// out of the snapshot before the handler runs, so a concurrent
    /// `remove_route` can never drop the handler out from under an
    /// in-flight dispatch (spec §5 concurrency model).
    pub async fn serve(&self, request: Request<Body>) -> Response {
        let path = request.uri().path().to_string();
        let method = request.method().clone();

        let snapshot = self.table.snapshot();
        let matched = snapshot.values().find_map(|route| {
            route
                .matcher
                .matches(&path, &method)
                .map(|outcome| (route.clone(), outcome))
        });

        let Some((route, outcome)) = matched else {
            warn!(%path, %method, "no route matched");
            return StatusCode::NOT_FOUND.into_response();
        };

        let context = RouteContext {
            path: route.path.clone(),
            path_prefix: route.path_prefix.clone(),
            vars: outcome.vars,
        };

        let mut request = request;
        request.extensions_mut().insert(context);

        let handler = route.handler.clone();
        match route.timeout {
            Some(timeout) if timeout > Duration::ZERO => {
                match tokio::time::timeout(timeout, (handler)(request)).await {
                    Ok(response) => response,
                    Err(_) => {
                        warn!(%path, ?timeout, "route handler exceeded its deadline");
                        StatusCode::GATEWAY_TIMEOUT.into_response()
                    }
                }
            }
            _ => (handler)(request).await,
        }
    }

    pub fn route_count(&self) -> usize {
        self.table.len()
    }
}

impl Default for DynamicRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;
    use std::sync::Arc;

    fn ok_pipeline() -> SharedPipeline {
        Arc::new(|_req| Box::pin(async { StatusCode::OK.into_response() }))
    }

    fn request(method: Method, path: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn rejects_duplicate_path_prefix_and_path() {
        let router = DynamicRouter::new();
        router
            .add_route(
                "/a".into(),
                "/p".into(),
                vec![],
                ok_pipeline(),
                None,
            )
            .await
            .unwrap();

        let err = router
            .add_route("/a".into(), "/p".into(), vec![], ok_pipeline(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::DuplicateRoute { .. }));
    }

    #[tokio::test]
    async fn serve_returns_404_when_no_route_matches() {
        let router = DynamicRouter::new();
        let response = router.serve(request(Method::GET, "/nope")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn serve_dispatches_first_match_and_attaches_context() {
        let router = DynamicRouter::new();
        router
            .add_route(
                "/items/{id}".into(),
                "/items".into(),
                vec!["GET".to_string()],
                Arc::new(|req| {
                    Box::pin(async move {
                        let ctx = req.extensions().get::<RouteContext>().cloned();
                        match ctx {
                            Some(ctx) if ctx.vars.get("id") == Some(&"42".to_string()) => {
                                StatusCode::OK.into_response()
                            }
                            _ => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
                        }
                    })
                }),
                None,
            )
            .await
            .unwrap();

        let response = router.serve(request(Method::GET, "/items/42")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn remove_route_is_idempotent() {
        let router = DynamicRouter::new();
        let id = router
            .add_route("/a".into(), "".into(), vec![], ok_pipeline(), None)
            .await
            .unwrap();

        router.remove_route(id).await;
        // second removal of the same, now-unknown, id must not panic.
        router.remove_route(id).await;
        assert_eq!(router.route_count(), 0);
    }

    #[tokio::test]
    async fn serve_returns_gateway_timeout_when_handler_exceeds_deadline() {
        let router = DynamicRouter::new();
        router
            .add_route(
                "/slow".into(),
                "".into(),
                vec![],
                Arc::new(|_req| {
                    Box::pin(async move {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        StatusCode::OK.into_response()
                    })
                }),
                Some(Duration::from_millis(5)),
            )
            .await
            .unwrap();

        let response = router.serve(request(Method::GET, "/slow")).await;
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn serve_ignores_zero_timeout() {
        let router = DynamicRouter::new();
        router
            .add_route(
                "/fast".into(),
                "".into(),
                vec![],
                ok_pipeline(),
                Some(Duration::ZERO),
            )
            .await
            .unwrap();

        let response = router.serve(request(Method::GET, "/fast")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
