//! End-to-end coverage of the public rate-limit and error-response API,
//! independent of any gateway wiring.

use std::time::Duration;

use bifrost_common::{ErrorResponse, RateLimitConfig, RateLimitError, TokenBucketLimiter};

#[tokio::test(start_paused = true)]
async fn bucket_refills_over_time_and_then_exceeds_again() {
    let limiter = TokenBucketLimiter::new(RateLimitConfig { rate: 1, burst: 1 }, 16);

    let first = limiter.acquire("route-a".to_string(), None).await.unwrap();
    assert_eq!(first.remaining, 0);

    let err = limiter.acquire("route-a".to_string(), None).await.unwrap_err();
    assert!(matches!(err, RateLimitError::Exceeded { limit: 1, .. }));

    tokio::time::advance(Duration::from_secs(1)).await;

    let refilled = limiter.acquire("route-a".to_string(), None).await;
    assert!(refilled.is_ok());
}

#[tokio::test]
async fn distinct_keys_get_independent_buckets() {
    let limiter = TokenBucketLimiter::new(RateLimitConfig { rate: 1, burst: 1 }, 16);

    assert!(limiter.acquire("a".to_string(), None).await.is_ok());
    // "b" has never been acquired, so it must not share "a"'s exhausted bucket.
    assert!(limiter.acquire("b".to_string(), None).await.is_ok());
    assert!(limiter.acquire("a".to_string(), None).await.is_err());
}

#[tokio::test]
async fn tracked_keys_count_stays_bounded_by_the_lru_cap() {
    let limiter = TokenBucketLimiter::new(RateLimitConfig::default(), 4);

    for i in 0..10 {
        limiter.acquire(format!("key-{i}"), None).await.unwrap();
    }

    assert_eq!(limiter.tracked_keys_count().await, 4);
}

#[tokio::test]
async fn per_route_config_overrides_the_limiter_default() {
    let limiter = TokenBucketLimiter::new(RateLimitConfig { rate: 100, burst: 100 }, 16);

    let strict = RateLimitConfig { rate: 1, burst: 1 };
    assert!(limiter.acquire("strict".to_string(), Some(strict)).await.is_ok());
    assert!(limiter.acquire("strict".to_string(), Some(strict)).await.is_err());
}

#[test]
fn error_response_round_trips_through_json_with_details() {
    let mut details = std::collections::HashMap::new();
    details.insert("field".to_string(), serde_json::json!("path_prefix"));

    let response = ErrorResponse::with_details("bad_request", "missing field", "trace-1", details);
    let json = serde_json::to_string(&response).unwrap();
    let parsed: ErrorResponse = serde_json::from_str(&json).unwrap();

    assert_eq!(parsed.error.code, "bad_request");
    assert_eq!(parsed.error.trace_id, "trace-1");
    assert_eq!(
        parsed.error.details.unwrap().get("field").unwrap(),
        "path_prefix"
    );
}

#[test]
fn error_response_without_details_omits_the_field_from_json() {
    let response = ErrorResponse::new("not_found", "no route matched", "trace-2");
    let json = serde_json::to_value(&response).unwrap();

    assert!(json["error"].get("details").is_none());
}
