use std::collections::HashMap;

/// A computed endpoint (spec §3 "Endpoint"): the result of planning one
/// config rule (or the default fallback) against a discovered service.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub downstream_path: String,
    pub downstream_path_prefix: String,
    pub upstream_url: String,
    pub upstream_path: String,
    pub upstream_path_prefix: String,
    pub methods: Vec<String>,
    pub handler_type: String,
    pub handler_config: serde_json::Value,
    pub filters: HashMap<String, serde_json::Value>,
    pub secured: bool,
    pub oidc_audience: String,
    pub timeout: Option<std::time::Duration>,
}
