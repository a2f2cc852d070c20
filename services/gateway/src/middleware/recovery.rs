//! Recovery middleware (C9): the last line of defense against unexpected
//! panics in a route's pipeline (spec §4.9, §7 "Internal"). Wraps the
//! request future the same way `tower_http::catch_panic::CatchPanicLayer`
//! does for `tower::Service`, adapted to this crate's functional
//! `SharedPipeline` composition rather than a `Service` impl.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::FutureExt;
use tracing::error;

use crate::gateway::MiddlewareFactory;
use crate::planner::Endpoint;

pub fn recovery_middleware() -> MiddlewareFactory {
    Arc::new(move |next, _endpoint: &Endpoint| {
        Arc::new(move |request: Request<Body>| {
            let next = next.clone();
            Box::pin(async move {
                match AssertUnwindSafe(next(request)).catch_unwind().await {
                    Ok(response) => response,
                    Err(panic) => {
                        let message = panic_message(&panic);
                        error!(%message, "recovery: handler panicked");
                        (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
                    }
                }
            })
        })
    })
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn catches_panic_and_returns_500() {
        let middleware = recovery_middleware();
        let dummy_endpoint = Endpoint {
            downstream_path: String::new(),
            downstream_path_prefix: String::new(),
            upstream_url: String::new(),
            upstream_path: String::new(),
            upstream_path_prefix: String::new(),
            methods: vec![],
            handler_type: "reverseproxy".to_string(),
            handler_config: serde_json::Value::Null,
            filters: Default::default(),
            secured: false,
            oidc_audience: String::new(),
            timeout: None,
        };

        let panics: Arc<
            dyn Fn(Request<Body>) -> std::pin::Pin<Box<dyn std::future::Future<Output = Response> + Send>>
                + Send
                + Sync,
        > = Arc::new(|_req| Box::pin(async { panic!("boom") }));

        let wrapped = middleware(panics, &dummy_endpoint);
        let request = Request::builder().body(Body::empty()).unwrap();
        let response = wrapped(request).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn passes_through_when_no_panic() {
        let middleware = recovery_middleware();
        let dummy_endpoint = Endpoint {
            downstream_path: String::new(),
            downstream_path_prefix: String::new(),
            upstream_url: String::new(),
            upstream_path: String::new(),
            upstream_path_prefix: String::new(),
            methods: vec![],
            handler_type: "reverseproxy".to_string(),
            handler_config: serde_json::Value::Null,
            filters: Default::default(),
            secured: false,
            oidc_audience: String::new(),
            timeout: None,
        };

        let ok: Arc<
            dyn Fn(Request<Body>) -> std::pin::Pin<Box<dyn std::future::Future<Output = Response> + Send>>
                + Send
                + Sync,
        > = Arc::new(|_req| Box::pin(async { StatusCode::OK.into_response() }));

        let wrapped = middleware(ok, &dummy_endpoint);
        let request = Request::builder().body(Body::empty()).unwrap();
        let response = wrapped(request).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
