//! End-to-end scenarios (spec §8): an in-process axum app, built the same
//! way `main` builds it, driven through `tower::ServiceExt::oneshot`
//! instead of a real TCP listener.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use bifrost_common::{RateLimitConfig, TokenBucketLimiter};
use bifrost_gateway::app::build_app;
use bifrost_gateway::config::{EndpointRule, GatewayConfig};
use bifrost_gateway::discovery::Service;
use bifrost_gateway::gateway::GatewayCoordinator;
use bifrost_gateway::middleware::cors::{cors_middleware, CorsOptions};
use bifrost_gateway::middleware::rate_limit::rate_limit_middleware;
use bifrost_gateway::middleware::recovery::recovery_middleware;
use bifrost_gateway::router::{DynamicRouter, RouteContext};
use tower::ServiceExt;

fn offers_service() -> Service {
    Service {
        uid: "svc-offers".to_string(),
        name: "offers-svc".to_string(),
        namespace: "default".to_string(),
        address: "http://offers.internal:80".to_string(),
        resource: "offers".to_string(),
        secured: false,
        oidc_audience: String::new(),
        version: "1".to_string(),
    }
}

/// Builds the same coordinator/middleware stack `main` does, minus auth and
/// discovery (exercised separately by unit tests), fronted by `build_app`.
async fn app_with_offers_route() -> axum::Router {
    let mut config = GatewayConfig::default();
    config.upstream_path_prefix = "/api".to_string();
    config.endpoints.push(EndpointRule {
        service_name: "offers".to_string(),
        upstream_path: "/add/{id}".to_string(),
        upstream_path_prefix: "/api/offers".to_string(),
        downstream_path: "/add_offer/{id}".to_string(),
        downstream_path_prefix: "/offers2".to_string(),
        methods: vec!["POST".to_string()],
        handler_type: None,
        handler_config: serde_json::Value::Null,
        filters: Default::default(),
        timeout_ms: 0,
    });

    let router = Arc::new(DynamicRouter::new());
    let mut coordinator = GatewayCoordinator::new(config, router.clone());

    coordinator.register_handler(
        "reverseproxy",
        Arc::new(|_endpoint| {
            Arc::new(|req: Request<Body>| {
                Box::pin(async move {
                    let id = req
                        .extensions()
                        .get::<RouteContext>()
                        .and_then(|ctx| ctx.vars.get("id").cloned())
                        .unwrap_or_default();
                    axum::response::Response::builder()
                        .status(StatusCode::OK)
                        .header("X-Matched-Id", id)
                        .body(Body::empty())
                        .unwrap()
                })
            })
        }),
    );

    coordinator.use_middleware("recovery", recovery_middleware());
    coordinator.use_middleware(
        "cors",
        cors_middleware(CorsOptions {
            allowed_origins: vec!["*".to_string()],
            allow_credentials: true,
        }),
    );

    let limiter = Arc::new(TokenBucketLimiter::new(
        RateLimitConfig { rate: 1, burst: 1 },
        bifrost_common::rate_limit::MAX_TRACKED_KEYS,
    ));
    coordinator.use_middleware(
        "rate_limit",
        rate_limit_middleware(limiter, RateLimitConfig { rate: 1, burst: 1 }),
    );

    coordinator.add_service(offers_service()).await.unwrap();

    build_app(router, "bifrost".to_string())
}

#[tokio::test]
async fn scenario_2_binds_path_prefix_and_downstream_path_together() {
    let app = app_with_offers_route().await;

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/offers2/add_offer/555")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("X-Matched-Id").unwrap(), "555");
    assert_eq!(response.headers().get("X-Gateway").unwrap(), "bifrost");
}

#[tokio::test]
async fn unmatched_path_returns_404() {
    let app = app_with_offers_route().await;

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri("/nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn wrong_method_on_a_known_path_is_not_matched() {
    let app = app_with_offers_route().await;

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri("/offers2/add_offer/555")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn second_request_within_the_same_second_is_rate_limited() {
    let app = app_with_offers_route().await;

    let first = app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/offers2/add_offer/1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/offers2/add_offer/2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn preflight_request_gets_cors_headers_without_reaching_the_handler() {
    let app = app_with_offers_route().await;

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/offers2/add_offer/555")
                .header("origin", "https://app.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "https://app.example"
    );
}
