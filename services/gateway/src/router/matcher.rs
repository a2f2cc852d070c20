//! Route matcher (C2): compiles a route descriptor into a predicate
//! `request → (matched, vars)`.

use std::collections::HashMap;

use axum::http::Method;

use super::pattern::{split_segments, RoutePattern};

/// Result of matching a request against a compiled route.
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    pub vars: HashMap<String, String>,
}

/// Compiled matcher for one route's `(pathPrefix, path, methods)`.
#[derive(Debug, Clone)]
pub struct CompiledMatcher {
    path_prefix: Option<RoutePattern>,
    path: Option<RoutePattern>,
    methods: Vec<Method>,
}

impl CompiledMatcher {
    /// Compile a route's descriptor. `path_prefix`/`path` empty strings are
    /// treated as unset (spec §4.2: "if set").
    pub fn compile(path_prefix: &str, path: &str, methods: &[String]) -> Self {
        let path_prefix = (!path_prefix.is_empty()).then(|| RoutePattern::parse(path_prefix));
        let path = (!path.is_empty()).then(|| RoutePattern::parse(path));
        let methods = methods
            .iter()
            .filter_map(|m| Method::from_bytes(m.to_uppercase().as_bytes()).ok())
            .collect();
        Self {
            path_prefix,
            path,
            methods,
        }
    }

    /// Match a request path and method. `methods` empty means "any method".
    pub fn matches(&self, request_path: &str, method: &Method) -> Option<MatchOutcome> {
        if !self.methods.is_empty() && !self.methods.contains(method) {
            return None;
        }

        let segments = split_segments(request_path);
        let mut vars = HashMap::new();

        if let Some(prefix) = &self.path_prefix {
            if !prefix.matches_prefix(&segments, &mut vars) {
                return None;
            }
        }

        if let Some(path) = &self.path {
            // `path` is matched against the full request path, independent
            // of any `pathPrefix` segment count (spec §4.2: the request path
            // must be under `pathPrefix` AND match `path`).
            if !path.matches_exact(&segments, &mut vars) {
                return None;
            }
        }

        Some(MatchOutcome { vars })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_prefix_only() {
        let matcher = CompiledMatcher::compile("/offers2", "", &[]);
        let result = matcher.matches("/offers2/add_offer/5", &Method::GET);
        assert!(result.is_some());
    }

    #[test]
    fn rejects_prefix_substring() {
        let matcher = CompiledMatcher::compile("/foo", "", &[]);
        assert!(matcher.matches("/foobar", &Method::GET).is_none());
    }

    #[test]
    fn requires_method_membership() {
        let matcher = CompiledMatcher::compile("", "/add", &["POST".to_string()]);
        assert!(matcher.matches("/add", &Method::GET).is_none());
        assert!(matcher.matches("/add", &Method::POST).is_some());
    }

    #[test]
    fn empty_methods_matches_any() {
        let matcher = CompiledMatcher::compile("", "/add", &[]);
        assert!(matcher.matches("/add", &Method::DELETE).is_some());
    }

    #[test]
    fn binds_path_vars_from_full_path_pattern() {
        let matcher = CompiledMatcher::compile("/offers2", "/offers2/add_offer/{id}", &[]);
        let result = matcher.matches("/offers2/add_offer/555", &Method::POST).unwrap();
        assert_eq!(result.vars.get("id"), Some(&"555".to_string()));
    }
}
