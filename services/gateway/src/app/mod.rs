//! Application wiring: builds the axum server around the dynamic router,
//! injecting the `X-Gateway` header and a trace id on every response
//! (spec §6 "External interfaces").

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, Request};
use axum::response::Response;
use axum::routing::any;
use axum::Router;
use bifrost_common::error::extract_trace_id_from_http;
use tower_http::trace::TraceLayer;

use crate::router::DynamicRouter;

#[derive(Clone)]
struct AppState {
    router: Arc<DynamicRouter>,
    gateway_name: String,
}

async fn dispatch(State(state): State<AppState>, request: Request<Body>) -> Response {
    let trace_id = extract_trace_id_from_http(request.headers());

    let mut response = state.router.serve(request).await;
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&state.gateway_name) {
        headers.insert("X-Gateway", value);
    }
    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        headers.insert("X-Trace-Id", value);
    }
    response
}

/// Build the axum `Router` that fronts the dynamic router. All matching is
/// done inside `DynamicRouter::serve` — axum only owns the listener and the
/// outer `X-Gateway`/trace-id/tracing concerns.
pub fn build_app(router: Arc<DynamicRouter>, gateway_name: String) -> Router {
    let state = AppState { router, gateway_name };

    Router::new()
        .fallback(any(dispatch))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    #[tokio::test]
    async fn fallback_dispatches_through_the_router_and_tags_response() {
        let router = Arc::new(DynamicRouter::new());
        let app = build_app(router, "bifrost".to_string());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/anything")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers().get("X-Gateway").unwrap(), "bifrost");
        assert!(response.headers().contains_key("X-Trace-Id"));
    }
}
