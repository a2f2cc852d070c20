//! Endpoint planner (C4): a pure function from discovered service + global
//! config to the list of endpoints the gateway coordinator should route
//! (spec §4.4).

mod endpoint;
mod join;

pub use endpoint::Endpoint;
pub use join::join;

use crate::config::{EndpointRule, GatewayConfig};
use crate::discovery::Service;

/// `plan(config, service) -> [Endpoint]`, per spec §4.4's algorithm.
/// Deterministic: identical inputs always produce an identical, equal
/// output (spec §8 property).
pub fn plan(config: &GatewayConfig, service: &Service) -> Vec<Endpoint> {
    let matching: Vec<&EndpointRule> = config
        .endpoints
        .iter()
        .filter(|rule| rule.service_name == service.resource)
        .collect();

    if matching.is_empty() {
        return vec![default_endpoint(config, service)];
    }

    matching
        .into_iter()
        .map(|rule| endpoint_from_rule(config, service, rule))
        .collect()
}

fn endpoint_from_rule(config: &GatewayConfig, service: &Service, rule: &EndpointRule) -> Endpoint {
    let downstream_path_prefix = if !rule.downstream_path_prefix.is_empty() {
        rule.downstream_path_prefix.clone()
    } else {
        join(&config.downstream_path_prefix, &service.resource)
    };

    let upstream_path_prefix = if !rule.upstream_path_prefix.is_empty() {
        rule.upstream_path_prefix.clone()
    } else {
        config.upstream_path_prefix.clone()
    };

    let upstream_url = join(
        &service.address,
        &join(&upstream_path_prefix, &rule.upstream_path),
    );

    let oidc_audience = if !service.oidc_audience.is_empty() {
        service.oidc_audience.clone()
    } else {
        service.name.clone()
    };

    Endpoint {
        downstream_path: rule.downstream_path.clone(),
        downstream_path_prefix,
        upstream_url,
        upstream_path: rule.upstream_path.clone(),
        upstream_path_prefix,
        methods: rule.methods.clone(),
        handler_type: rule
            .handler_type
            .clone()
            .unwrap_or_else(|| "reverseproxy".to_string()),
        handler_config: rule.handler_config.clone(),
        filters: rule.filters.clone(),
        secured: service.secured,
        oidc_audience,
        timeout: timeout_from_ms(rule.timeout_ms),
    }
}

fn timeout_from_ms(ms: u64) -> Option<std::time::Duration> {
    (ms > 0).then(|| std::time::Duration::from_millis(ms))
}

fn default_endpoint(config: &GatewayConfig, service: &Service) -> Endpoint {
    let downstream_path_prefix = join(&config.downstream_path_prefix, &service.resource);
    let upstream_url = join(&service.address, &config.upstream_path_prefix);

    let oidc_audience = if !service.oidc_audience.is_empty() {
        service.oidc_audience.clone()
    } else {
        service.name.clone()
    };

    Endpoint {
        downstream_path: String::new(),
        downstream_path_prefix,
        upstream_url,
        upstream_path: String::new(),
        upstream_path_prefix: config.upstream_path_prefix.clone(),
        methods: Vec::new(),
        handler_type: "reverseproxy".to_string(),
        handler_config: serde_json::Value::Null,
        filters: Default::default(),
        secured: service.secured,
        oidc_audience,
        timeout: None,
    }
}
