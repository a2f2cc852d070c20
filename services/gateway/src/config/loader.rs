use std::path::Path;

use config::{Config, ConfigError, Environment, File};

use super::constants::*;
use super::types::GatewayConfig;

impl GatewayConfig {
    /// Load configuration from a YAML file, layered over defaults and
    /// overridable by `BIFROST_`-prefixed environment variables (spec §6,
    /// ambient configuration stack per SPEC_FULL.md).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let built = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let gateway_config: GatewayConfig = built.try_deserialize()?;
        gateway_config.validate()?;
        Ok(gateway_config)
    }

    /// Validate cross-field invariants the `Deserialize` impl can't express.
    /// A `ConfigError` here is fatal at startup (`ConfigError`, spec §7).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Message(ERR_ZERO_PORT.to_string()));
        }

        for endpoint in &self.endpoints {
            if endpoint.service_name.is_empty() {
                return Err(ConfigError::Message(
                    ERR_EMPTY_ENDPOINT_SERVICE_NAME.to_string(),
                ));
            }
        }

        if self.discovery.enabled && self.discovery.url.is_empty() {
            return Err(ConfigError::Message(
                ERR_DISCOVERY_ENABLED_WITHOUT_URL.to_string(),
            ));
        }

        if let Some(auth) = &self.auth {
            if auth.authority.is_empty() {
                return Err(ConfigError::Message(ERR_EMPTY_AUTH_AUTHORITY.to_string()));
            }
        }

        if let Some(broker) = &self.broker {
            if broker.base_url.is_empty() {
                return Err(ConfigError::Message(ERR_EMPTY_BROKER_BASE_URL.to_string()));
            }
        }

        Ok(())
    }
}
