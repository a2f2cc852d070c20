//! Benchmarks the route-matching hot path (C2/C3): snapshot iteration plus
//! per-route matcher evaluation under a realistically sized route table.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::IntoResponse;
use bifrost_gateway::router::{DynamicRouter, SharedPipeline};
use criterion::{criterion_group, criterion_main, Criterion};

fn ok_pipeline() -> SharedPipeline {
    Arc::new(|_req| Box::pin(async { StatusCode::OK.into_response() }))
}

fn build_router(route_count: usize) -> DynamicRouter {
    let router = DynamicRouter::new();
    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime.block_on(async {
        for i in 0..route_count {
            router
                .add_route(
                    format!("/add_offer/{{id}}"),
                    format!("/service{i}"),
                    vec!["POST".to_string()],
                    ok_pipeline(),
                    None,
                )
                .await
                .unwrap();
        }
    });
    router
}

fn bench_match_last_route(c: &mut Criterion) {
    let route_count = 500;
    let router = build_router(route_count);
    let runtime = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("serve_last_of_500_routes", |b| {
        b.iter(|| {
            runtime.block_on(async {
                let request = Request::builder()
                    .method(Method::POST)
                    .uri(format!("/service{}/add_offer/42", route_count - 1))
                    .body(Body::empty())
                    .unwrap();
                router.serve(request).await
            })
        })
    });
}

fn bench_no_match(c: &mut Criterion) {
    let router = build_router(500);
    let runtime = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("serve_no_match_among_500_routes", |b| {
        b.iter(|| {
            runtime.block_on(async {
                let request = Request::builder()
                    .method(Method::GET)
                    .uri("/does-not-exist")
                    .body(Body::empty())
                    .unwrap();
                router.serve(request).await
            })
        })
    });
}

criterion_group!(benches, bench_match_last_route, bench_no_match);
criterion_main!(benches);
