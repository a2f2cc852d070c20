//! Rate-limit middleware (C9): a per-route token bucket built on
//! [`bifrost_common::rate_limit`] (spec §4.9). Keyed by the endpoint's
//! `(downstreamPathPrefix, downstreamPath)` identity, which is fixed at
//! pipeline-composition time and 1:1 with the route id that `addRoute`
//! later assigns — so it serves the same purpose as keying by `RouteId`
//! without requiring the id to exist before the pipeline is built.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use bifrost_common::{RateLimitConfig, RateLimitError, TokenBucketLimiter};

use crate::gateway::MiddlewareFactory;
use crate::planner::Endpoint;

pub const RATE_LIMIT_FILTER_CODE: &str = "rate_limit";

fn endpoint_config(endpoint: &Endpoint, default_config: &RateLimitConfig) -> RateLimitConfig {
    endpoint
        .filters
        .get(RATE_LIMIT_FILTER_CODE)
        .and_then(|value| serde_json::from_value::<RateLimitConfig>(value.clone()).ok())
        .unwrap_or_else(|| default_config.clone())
        .clamped()
}

pub fn rate_limit_middleware(
    limiter: Arc<TokenBucketLimiter<String>>,
    default_config: RateLimitConfig,
) -> MiddlewareFactory {
    Arc::new(move |next, endpoint: &Endpoint| {
        let limiter = limiter.clone();
        let key = format!("{}\u{0}{}", endpoint.downstream_path_prefix, endpoint.downstream_path);
        let config = endpoint_config(endpoint, &default_config);

        Arc::new(move |request: Request<Body>| {
            let limiter = limiter.clone();
            let key = key.clone();
            let config = config.clone();
            let next = next.clone();
            Box::pin(async move {
                match limiter.acquire(key, Some(config)).await {
                    Ok(snapshot) => {
                        let mut response = next(request).await;
                        set_rate_limit_headers(&mut response, snapshot.limit, snapshot.remaining, snapshot.reset_seconds);
                        response
                    }
                    Err(RateLimitError::Exceeded { limit, remaining }) => {
                        let mut response = StatusCode::TOO_MANY_REQUESTS.into_response();
                        set_rate_limit_headers(&mut response, limit, remaining, 1);
                        response
                    }
                }
            })
        })
    })
}

fn set_rate_limit_headers(response: &mut Response, limit: u32, remaining: u32, reset_seconds: u64) {
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&limit.to_string()) {
        headers.insert("X-Rate-Limit-Limit", value);
    }
    if let Ok(value) = HeaderValue::from_str(&remaining.to_string()) {
        headers.insert("X-Rate-Limit-Remaining", value);
    }
    if let Ok(value) = HeaderValue::from_str(&reset_seconds.to_string()) {
        headers.insert("X-Rate-Limit-Reset", value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> Endpoint {
        Endpoint {
            downstream_path: "/a".to_string(),
            downstream_path_prefix: "/p".to_string(),
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
        }
    }

    #[tokio::test]
    async fn exhausting_the_bucket_returns_429() {
        let limiter = Arc::new(TokenBucketLimiter::new(
            RateLimitConfig { rate: 1, burst: 1 },
            100,
        ));
        let middleware = rate_limit_middleware(limiter, RateLimitConfig { rate: 1, burst: 1 });

        let ok: crate::router::SharedPipeline =
            Arc::new(|_req| Box::pin(async { StatusCode::OK.into_response() }));
        let wrapped = middleware(ok, &endpoint());

        let first = wrapped(Request::builder().body(Body::empty()).unwrap()).await;
        assert_eq!(first.status(), StatusCode::OK);

        let second = wrapped(Request::builder().body(Body::empty()).unwrap()).await;
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
