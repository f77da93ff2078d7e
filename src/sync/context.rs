//! The `SyncContext` holds the validated configuration and the injected
//! collaborator handles one mirror run works with

use crate::dns::client::TransferClient;
use crate::sync::provider::ZoneProvider;

#[derive(Debug)]
pub enum ConfigError {
    MissingParameter(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingParameter(name) => write!(f, "configuration missing: {}", name),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Everything one mirror run needs to know, constructed and validated once
/// before the core runs
#[derive(Debug, Clone, Default)]
pub struct SyncConfig {
    /// Source domains to mirror, in processing order
    pub domains: Vec<String>,
    /// Candidate master servers, probed in order
    pub masters: Vec<String>,
    /// Identifier of the hosted target zone at the provider
    pub zone_id: String,
    /// Origin name of the hosted target zone
    pub zone_name: String,
    /// Relative name of the serial marker record
    pub serial_record: String,
    /// Base URL of the provider API
    pub provider_endpoint: String,
    /// Log the change batch instead of submitting it
    pub dry_run: bool,
    /// Tolerate TTL drift on otherwise equal record sets
    pub ignore_ttl: bool,
}

impl SyncConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.domains.is_empty() {
            return Err(ConfigError::MissingParameter("domains"));
        }
        if self.masters.is_empty() {
            return Err(ConfigError::MissingParameter("masters"));
        }
        if self.zone_id.is_empty() {
            return Err(ConfigError::MissingParameter("zone id"));
        }
        if self.zone_name.is_empty() {
            return Err(ConfigError::MissingParameter("zone name"));
        }
        if self.serial_record.is_empty() {
            return Err(ConfigError::MissingParameter("serial record name"));
        }
        if self.provider_endpoint.is_empty() {
            return Err(ConfigError::MissingParameter("provider endpoint"));
        }

        Ok(())
    }
}

/// Shared state for one mirror run
///
/// The collaborators are injected as trait objects so the orchestrator can
/// be driven by test doubles.
pub struct SyncContext {
    pub config: SyncConfig,
    pub transfer: Box<dyn TransferClient>,
    pub provider: Box<dyn ZoneProvider>,
}

impl SyncContext {
    pub fn new(
        config: SyncConfig,
        transfer: Box<dyn TransferClient>,
        provider: Box<dyn ZoneProvider>,
    ) -> SyncContext {
        SyncContext {
            config,
            transfer,
            provider,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_config() -> SyncConfig {
        SyncConfig {
            domains: vec!["activedirectory.example.org".to_string()],
            masters: vec!["10.0.0.53".to_string()],
            zone_id: "Z123".to_string(),
            zone_name: "example.org".to_string(),
            serial_record: "zoneserial".to_string(),
            provider_endpoint: "http://provider.internal".to_string(),
            dry_run: false,
            ignore_ttl: false,
        }
    }

    #[test]
    fn test_full_config_validates() {
        assert!(full_config().validate().is_ok());
    }

    #[test]
    fn test_missing_parameters_are_rejected() {
        let mut config = full_config();
        config.domains.clear();
        assert!(config.validate().is_err());

        let mut config = full_config();
        config.zone_name = String::new();
        assert!(config.validate().is_err());
    }
}
