pub const ERR_ZERO_PORT: &str = "server port must be non-zero";
pub const ERR_EMPTY_ENDPOINT_SERVICE_NAME: &str = "endpoint rule is missing service_name";
pub const ERR_DISCOVERY_ENABLED_WITHOUT_URL: &str = "discovery.enabled is true but discovery.url is empty";
pub const ERR_EMPTY_AUTH_AUTHORITY: &str = "auth.authority must not be empty when auth is configured";
pub const ERR_EMPTY_BROKER_BASE_URL: &str = "broker.base_url must not be empty when broker is configured";

/// Environment variable prefix for configuration overrides (`BIFROST_PORT`,
/// `BIFROST_DISCOVERY__URL`, ...; `__` separates nested fields).
pub const ENV_PREFIX: &str = "BIFROST";
