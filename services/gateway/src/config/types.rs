use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use bifrost_common::RateLimitConfig;

/// Top-level gateway configuration (spec §6 "Configuration").
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub upstream_path_prefix: String,
    #[serde(default)]
    pub downstream_path_prefix: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub endpoints: Vec<EndpointRule>,

    /// Kubernetes-style provider hints (out of scope per §1; carried through
    /// unused by the shipped polling discovery adapter, kept so a future
    /// Kubernetes provider can read the same config document).
    #[serde(default)]
    pub in_cluster: bool,
    #[serde(default)]
    pub override_service_address: Option<String>,

    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub auth: Option<AuthConfig>,
    #[serde(default)]
    pub broker: Option<BrokerConfig>,
    #[serde(default)]
    pub cors: Option<CorsConfig>,
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            name: default_name(),
            upstream_path_prefix: String::new(),
            downstream_path_prefix: String::new(),
            log_level: default_log_level(),
            endpoints: Vec::new(),
            in_cluster: false,
            override_service_address: None,
            discovery: DiscoveryConfig::default(),
            auth: None,
            broker: None,
            cors: None,
            rate_limit: None,
        }
    }
}

fn default_port() -> u16 {
    8080
}

fn default_name() -> String {
    "bifrost".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// One `endpoints[]` rule, matched against a discovered service's `resource`
/// field by the endpoint planner (C4, spec §4.4).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointRule {
    pub service_name: String,
    #[serde(default)]
    pub upstream_path: String,
    #[serde(default)]
    pub upstream_path_prefix: String,
    #[serde(default)]
    pub downstream_path: String,
    #[serde(default)]
    pub downstream_path_prefix: String,
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default)]
    pub handler_type: Option<String>,
    #[serde(default)]
    pub handler_config: serde_json::Value,
    #[serde(default)]
    pub filters: HashMap<String, serde_json::Value>,
    /// **[ADDED]** Per-route deadline in milliseconds; `0` or unset means no
    /// deadline (spec §5: "configurable per route via `Route.timeout`").
    #[serde(default)]
    pub timeout_ms: u64,
}

/// **[ADDED]** Polling discovery-source adapter configuration (C10).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscoveryConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,
}

fn default_poll_interval_seconds() -> u64 {
    10
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            poll_interval_seconds: default_poll_interval_seconds(),
        }
    }
}

/// **[ADDED]** JWKS/OIDC client configuration (C8).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// OIDC authority base URL; `<authority>/.well-known/openid-configuration`
    /// is fetched once to discover `jwks_uri`.
    pub authority: String,
}

/// **[ADDED]** HTTP-POST message broker configuration (C7).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrokerConfig {
    pub base_url: String,
    #[serde(default)]
    pub topic_prefix: String,
    #[serde(default = "default_broker_source")]
    pub source: String,
}

fn default_broker_source() -> String {
    "bifrost".to_string()
}

/// **[ADDED]** CORS middleware configuration (C9). Allowed methods/headers
/// are fixed by the spec (§4.9); only origins and credentials are
/// configurable here.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    #[serde(default)]
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allow_credentials: true,
        }
    }
}
