//! Reverse-proxy handler (C6): rewrites the request URL against the
//! endpoint's upstream target and forwards it through a shared HTTP
//! transport, grounded on the source's `reverseproxy.GetDirector` /
//! `ModifyResponse` (spec §4.6).

use std::collections::HashMap;

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::{error, trace};
use url::Url;

use crate::abstraction::HTTP_USER_ID_HEADER;
use crate::planner::Endpoint;
use crate::router::{RouteContext, SharedPipeline};

const STRIPPED_RESPONSE_HEADERS: &[&str] = &[
    "access-control-allow-origin",
    "access-control-allow-credentials",
    "access-control-allow-methods",
    "access-control-allow-headers",
];

/// Build the terminal pipeline for a `"reverseproxy"` endpoint. `client` is
/// the shared transport constructed once at startup (spec §4.6
/// "Construction").
pub fn reverse_proxy_handler(client: reqwest::Client, endpoint: &Endpoint) -> SharedPipeline {
    let upstream_url = endpoint.upstream_url.clone();
    let upstream_path = endpoint.upstream_path.clone();

    std::sync::Arc::new(move |request: Request<Body>| {
        let client = client.clone();
        let upstream_url = upstream_url.clone();
        let upstream_path = upstream_path.clone();
        Box::pin(async move { dispatch(client, upstream_url, upstream_path, request).await })
    })
}

async fn dispatch(
    client: reqwest::Client,
    upstream_url: String,
    upstream_path: String,
    request: Request<Body>,
) -> Response {
    let Some(route_context) = request.extensions().get::<RouteContext>().cloned() else {
        error!("reverseproxy: routeContext missing from request");
        return internal_error("routeContext missing");
    };

    let target = match Url::parse(&upstream_url) {
        Ok(url) => url,
        Err(err) => {
            error!(%err, %upstream_url, "reverseproxy: cannot parse upstream url");
            return internal_error("invalid upstream url");
        }
    };

    let claims = request
        .extensions()
        .get::<crate::middleware::auth::Claims>()
        .cloned();

    let (parts, body) = request.into_parts();
    let request_path = parts.uri.path().to_string();
    let request_query = parts.uri.query().unwrap_or("").to_string();

    let (out_path, out_query) = direct_target(
        &target,
        &upstream_path,
        &route_context.path_prefix,
        &request_path,
        &request_query,
        &route_context.vars,
    );

    // Build the outbound URL by string concatenation rather than
    // `Url::set_path`, which re-percent-encodes its argument and would
    // double-encode a path that already contains `%2F` (spec §8 scenario 4:
    // percent-encoded segments must reach upstream untouched).
    let authority = format!(
        "{}://{}",
        target.scheme(),
        target.host_str().unwrap_or_default()
    );
    let authority = match target.port() {
        Some(port) => format!("{authority}:{port}"),
        None => authority,
    };
    let outbound_url = if out_query.is_empty() {
        format!("{authority}{out_path}")
    } else {
        format!("{authority}{out_path}?{out_query}")
    };

    let method = match reqwest::Method::from_bytes(parts.method.as_str().as_bytes()) {
        Ok(method) => method,
        Err(_) => return internal_error("invalid method"),
    };

    let mut builder = client.request(method, outbound_url.as_str());

    let mut has_user_agent = false;
    for (name, value) in parts.headers.iter() {
        if name == axum::http::header::HOST {
            continue;
        }
        if name == axum::http::header::USER_AGENT {
            has_user_agent = true;
        }
        builder = builder.header(name.as_str(), value.as_bytes());
    }
    if !has_user_agent {
        // Suppress reqwest's default User-Agent, matching the source's
        // explicit empty header when absent.
        builder = builder.header(axum::http::header::USER_AGENT, "");
    }
    if let Some(claims) = &claims {
        if let Some(sub) = claims.0.get("sub").and_then(|v| v.as_str()) {
            builder = builder.header(HTTP_USER_ID_HEADER, sub);
        }
    }

    let body_bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            error!(%err, "reverseproxy: failed reading request body");
            return internal_error("failed reading request body");
        }
    };
    builder = builder.body(body_bytes);

    trace!(%request_path, %outbound_url, "forwarding request");

    let upstream_response = match builder.send().await {
        Ok(response) => response,
        Err(err) => {
            error!(%err, %outbound_url, "reverseproxy: upstream round-trip failed");
            return (StatusCode::BAD_GATEWAY, "bad gateway").into_response();
        }
    };

    build_response(upstream_response).await
}

/// Pure director logic (spec §4.6 steps 4-5): computes the outbound path
/// and query given the parsed upstream target, the endpoint's configured
/// `upstreamPath`, the matched route's `pathPrefix`, and the inbound
/// request's raw (still percent-encoded) path and query.
fn direct_target(
    target: &Url,
    upstream_path: &str,
    route_path_prefix: &str,
    request_path: &str,
    request_query: &str,
    vars: &HashMap<String, String>,
) -> (String, String) {
    let (mut out_path, mut out_query) = if upstream_path.is_empty() {
        let stripped = request_path.strip_prefix(route_path_prefix).unwrap_or(request_path);
        let joined = crate::planner::join(target.path(), stripped);
        let query = match (target.query(), request_query) {
            (Some(t), "") => t.to_string(),
            (None, q) => q.to_string(),
            (Some(t), q) => format!("{t}&{q}"),
        };
        (joined, query)
    } else {
        (target.path().to_string(), target.query().unwrap_or("").to_string())
    };

    out_path = replace_vars_in_target(&out_path, vars);
    out_query = replace_vars_in_target(&out_query, vars);
    (out_path, out_query)
}

async fn build_response(upstream: reqwest::Response) -> Response {
    let status = upstream.status();
    let headers = upstream.headers().clone();
    let body = match upstream.bytes().await {
        Ok(bytes) => bytes,
        Err(err) => {
            error!(%err, "reverseproxy: failed streaming upstream body");
            return internal_error("failed reading upstream response");
        }
    };

    let mut response = Response::builder()
        .status(axum::http::StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::OK));

    for (name, value) in headers.iter() {
        let name_lower = name.as_str().to_ascii_lowercase();
        if STRIPPED_RESPONSE_HEADERS.contains(&name_lower.as_str()) {
            continue;
        }
        if let (Ok(header_name), Ok(header_value)) = (
            HeaderName::from_bytes(name.as_str().as_bytes()),
            HeaderValue::from_bytes(value.as_bytes()),
        ) {
            response = response.header(header_name, header_value);
        }
    }

    response
        .body(Body::from(body))
        .unwrap_or_else(|_| internal_error("failed building response"))
}

/// Substitute `{name}` path-vars, first occurrence per key only — mirrors
/// `strings.Replace(url, "{"+key+"}", val, 1)` in the source.
fn replace_vars_in_target(target: &str, vars: &HashMap<String, String>) -> String {
    let mut out = target.to_string();
    for (key, value) in vars {
        let needle = format!("{{{key}}}");
        if let Some(pos) = out.find(&needle) {
            out.replace_range(pos..pos + needle.len(), value);
        }
    }
    out
}

fn internal_error(message: &str) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, message.to_string()).into_response()
}
