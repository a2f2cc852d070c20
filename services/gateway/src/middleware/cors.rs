//! CORS middleware (C9): handles preflight and actual requests with a
//! fixed set of allowed methods/headers (spec §4.9).

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::gateway::MiddlewareFactory;
use crate::planner::Endpoint;

const ALLOWED_METHODS: &str = "GET, HEAD, POST, PUT, PATCH, DELETE, OPTIONS";
const ENUMERATED_ALLOWED_HEADERS: &str =
    "Accept, Accept-Language, Content-Language, Origin, X-Requested-With, Content-Type, Authorization";

#[derive(Clone)]
pub struct CorsOptions {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

fn resolve_allowed_origin(options: &CorsOptions, request_origin: Option<&str>) -> Option<String> {
    if options.allowed_origins.iter().any(|o| o == "*") {
        return Some(request_origin.map(str::to_string).unwrap_or_else(|| "*".to_string()));
    }
    let origin = request_origin?;
    options
        .allowed_origins
        .iter()
        .any(|allowed| allowed == origin)
        .then(|| origin.to_string())
}

fn apply_cors_headers(response: &mut Response, options: &CorsOptions, request_origin: Option<&str>) {
    if let Some(allowed_origin) = resolve_allowed_origin(options, request_origin) {
        if let Ok(value) = HeaderValue::from_str(&allowed_origin) {
            response.headers_mut().insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
        }
        if options.allow_credentials {
            response
                .headers_mut()
                .insert(header::ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        }
    }
}

/// `MiddlewareFactory` for CORS, applied ahead of the endpoint's own
/// concerns so every response — including error responses from downstream
/// middlewares — carries the right headers (spec §4.9).
pub fn cors_middleware(options: CorsOptions) -> MiddlewareFactory {
    let options = Arc::new(options);
    Arc::new(move |next, _endpoint: &Endpoint| {
        let options = options.clone();
        Arc::new(move |request: Request<Body>| {
            let options = options.clone();
            let next = next.clone();
            Box::pin(async move {
                let origin = request
                    .headers()
                    .get(header::ORIGIN)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);

                if request.method() == Method::OPTIONS {
                    let mut response = StatusCode::NO_CONTENT.into_response();
                    response
                        .headers_mut()
                        .insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOWED_METHODS));
                    response.headers_mut().insert(
                        header::ACCESS_CONTROL_ALLOW_HEADERS,
                        HeaderValue::from_static(ENUMERATED_ALLOWED_HEADERS),
                    );
                    apply_cors_headers(&mut response, &options, origin.as_deref());
                    return response;
                }

                let mut response = next(request).await;
                apply_cors_headers(&mut response, &options, origin.as_deref());
                response
            })
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_origin_echoes_request_origin() {
        let options = CorsOptions {
            allowed_origins: vec!["*".to_string()],
            allow_credentials: true,
        };
        assert_eq!(
            resolve_allowed_origin(&options, Some("https://app.example")),
            Some("https://app.example".to_string())
        );
    }

    #[test]
    fn unlisted_origin_is_rejected() {
        let options = CorsOptions {
            allowed_origins: vec!["https://allowed.example".to_string()],
            allow_credentials: false,
        };
        assert_eq!(resolve_allowed_origin(&options, Some("https://other.example")), None);
    }

    #[test]
    fn listed_origin_is_allowed() {
        let options = CorsOptions {
            allowed_origins: vec!["https://allowed.example".to_string()],
            allow_credentials: false,
        };
        assert_eq!(
            resolve_allowed_origin(&options, Some("https://allowed.example")),
            Some("https://allowed.example".to_string())
        );
    }
}
