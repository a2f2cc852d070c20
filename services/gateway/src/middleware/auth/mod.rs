//! Auth middleware (C8): validates a bearer token against an OIDC
//! authority, enforces per-endpoint scope/claim requirements, and injects
//! claims into the request context (spec §4.8), grounded on the source's
//! `middleware/auth/auth.go`.

mod jwks;

pub use jwks::{JwksError, JwksKeyResolver};

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use jsonwebtoken::decode_header;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::gateway::MiddlewareFactory;
use crate::planner::Endpoint;

pub const AUTHORIZATION_FILTER_CODE: &str = "auth";

/// Decoded JWT claims, injected into the request context on success
/// (spec §4.8 step 6).
#[derive(Debug, Clone)]
pub struct Claims(pub serde_json::Map<String, Value>);

#[derive(Debug, Default, Deserialize)]
struct EndpointAuthOptions {
    #[serde(default)]
    claims_requirement: HashMap<String, String>,
    #[serde(default)]
    allowed_scopes: Vec<String>,
    #[serde(default)]
    audience: Option<String>,
    #[serde(default)]
    disabled: bool,
}

fn endpoint_options(endpoint: &Endpoint) -> EndpointAuthOptions {
    endpoint
        .filters
        .get(AUTHORIZATION_FILTER_CODE)
        .and_then(|value| serde_json::from_value(value.clone()).ok())
        .unwrap_or_default()
}

/// `MiddlewareFactory` for the auth filter. Endpoints with `secured: false`
/// or a `disabled: true` filter option pass through untouched
/// (spec §4.8 step 1).
pub fn auth_middleware(resolver: Arc<JwksKeyResolver>) -> MiddlewareFactory {
    Arc::new(move |next, endpoint: &Endpoint| {
        let options = endpoint_options(endpoint);

        if !endpoint.secured || options.disabled {
            return next;
        }

        let resolver = resolver.clone();
        let audience = options
            .audience
            .clone()
            .unwrap_or_else(|| endpoint.oidc_audience.clone());

        Arc::new(move |request: Request<Body>| {
            let resolver = resolver.clone();
            let audience = audience.clone();
            let options = EndpointAuthOptions {
                claims_requirement: options.claims_requirement.clone(),
                allowed_scopes: options.allowed_scopes.clone(),
                audience: options.audience.clone(),
                disabled: options.disabled,
            };
            let next = next.clone();
            Box::pin(async move { authorize(resolver, audience, options, request, next).await })
        })
    })
}

async fn authorize(
    resolver: Arc<JwksKeyResolver>,
    audience: String,
    options: EndpointAuthOptions,
    request: Request<Body>,
    next: crate::router::SharedPipeline,
) -> Response {
    let token = match extract_token(&request) {
        Some(token) => token,
        None => return unauthorized("missing bearer token"),
    };

    let claims = match validate(&resolver, &audience, &token).await {
        Ok(claims) => claims,
        Err(err) => {
            warn!(%err, "auth: token validation failed");
            return unauthorized(&err.to_string());
        }
    };

    if !options.allowed_scopes.is_empty() {
        let token_scopes = claims
            .get("scope")
            .and_then(|v| v.as_str())
            .map(|s| s.split_whitespace().map(str::to_string).collect::<Vec<_>>())
            .unwrap_or_default();
        let has_any = options
            .allowed_scopes
            .iter()
            .any(|required| token_scopes.iter().any(|scope| scope == required));
        if !has_any {
            return forbidden_scope(&options.allowed_scopes.join(" "));
        }
    }

    if !options.claims_requirement.is_empty() {
        let satisfies = options.claims_requirement.iter().all(|(key, expected)| {
            claims
                .get(key)
                .and_then(|v| v.as_str())
                .map(|actual| actual == expected)
                .unwrap_or(false)
        });
        if !satisfies {
            return forbidden_claims();
        }
    }

    let mut request = request;
    request.extensions_mut().insert(Claims(claims));
    next(request).await
}

#[derive(Debug, thiserror::Error)]
enum ValidationError {
    #[error("missing kid in token header")]
    MissingKid,
    #[error("key resolution failed: {0}")]
    Jwks(#[from] JwksError),
    #[error("invalid token: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

async fn validate(
    resolver: &JwksKeyResolver,
    audience: &str,
    token: &str,
) -> Result<serde_json::Map<String, Value>, ValidationError> {
    let header = decode_header(token)?;
    let kid = header.kid.ok_or(ValidationError::MissingKid)?;
    let key = resolver.resolve(&kid).await?;
    let issuer = resolver.issuer().await?;

    let validation = jwks::default_validation(&issuer, audience);
    let data = jsonwebtoken::decode::<serde_json::Map<String, Value>>(token, &key, &validation)?;
    Ok(data.claims)
}

/// OAuth2 bearer extractor: `Authorization: Bearer <token>` header or
/// `access_token` query parameter (spec §4.8 step 2).
fn extract_token(request: &Request<Body>) -> Option<String> {
    if let Some(value) = request.headers().get(header::AUTHORIZATION) {
        if let Ok(value) = value.to_str() {
            if let Some(token) = value.strip_prefix("Bearer ") {
                return Some(token.to_string());
            }
        }
    }

    request
        .uri()
        .query()
        .and_then(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == "access_token")
                .map(|(_, value)| value.into_owned())
        })
}

fn unauthorized(description: &str) -> Response {
    let mut response = StatusCode::UNAUTHORIZED.into_response();
    let value = format!(
        "Bearer error=\"invalid_token\", error_description=\"{}\"",
        sanitize_for_header(description)
    );
    if let Ok(value) = value.parse() {
        response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
    }
    response
}

fn forbidden_scope(required_scope: &str) -> Response {
    let mut response = StatusCode::FORBIDDEN.into_response();
    let value = format!(
        "Bearer error=\"insufficient_scope\", scope=\"{}\"",
        sanitize_for_header(required_scope)
    );
    if let Ok(value) = value.parse() {
        response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
    }
    response
}

/// Strips characters a `HeaderValue` can't carry (anything outside visible
/// ASCII plus space) — `description`/`scope` can echo attacker-controlled
/// token contents (e.g. a crafted `kid`), so this must never panic.
fn sanitize_for_header(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii() && (*c == ' ' || !c.is_ascii_control()))
        .collect()
}

fn forbidden_claims() -> Response {
    StatusCode::FORBIDDEN.into_response()
}
