//! Configuration validation.
//!
//! Semantic checks that serde cannot express: address formats, value
//! ranges, cross-field requirements. Validation is a pure function and
//! returns all errors, not just the first.

use std::net::SocketAddr;

use alloy::primitives::Address;

use crate::config::schema::CastLabConfig;

/// A single semantic validation failure.
#[derive(Debug)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &CastLabConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError {
            field: "listener.bind_address",
            message: format!("'{}' is not a socket address", config.listener.bind_address),
        });
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError {
            field: "timeouts.request_secs",
            message: "must be greater than zero".to_string(),
        });
    }

    if config.chain.enabled {
        if config.chain.rpc_url.parse::<url::Url>().is_err() {
            errors.push(ValidationError {
                field: "chain.rpc_url",
                message: format!("'{}' is not a valid URL", config.chain.rpc_url),
            });
        }
        if config.chain.chain_id == 0 {
            errors.push(ValidationError {
                field: "chain.chain_id",
                message: "must be non-zero".to_string(),
            });
        }
        if config.chain.gas_price_multiplier < 1.0 {
            errors.push(ValidationError {
                field: "chain.gas_price_multiplier",
                message: "must be at least 1.0".to_string(),
            });
        }
        if config.contracts.funding_address.parse::<Address>().is_err() {
            errors.push(ValidationError {
                field: "contracts.funding_address",
                message: format!("'{}' is not an address", config.contracts.funding_address),
            });
        }
        if config.contracts.token_address.parse::<Address>().is_err() {
            errors.push(ValidationError {
                field: "contracts.token_address",
                message: format!("'{}' is not an address", config.contracts.token_address),
            });
        }
    }

    if config.funding.claim_timeout_secs == 0 {
        errors.push(ValidationError {
            field: "funding.claim_timeout_secs",
            message: "must be greater than zero".to_string(),
        });
    }
    if config.funding.poll_interval_ms == 0 {
        errors.push(ValidationError {
            field: "funding.poll_interval_ms",
            message: "must be greater than zero".to_string(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError {
            field: "observability.metrics_address",
            message: format!(
                "'{}' is not a socket address",
                config.observability.metrics_address
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&CastLabConfig::default()).is_ok());
    }

    #[test]
    fn test_chain_disabled_skips_contract_checks() {
        let mut config = CastLabConfig::default();
        config.chain.enabled = false;
        config.contracts.funding_address = "not-an-address".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_chain_enabled_requires_addresses() {
        let mut config = CastLabConfig::default();
        config.chain.enabled = true;
        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert!(fields.contains(&"contracts.funding_address"));
        assert!(fields.contains(&"contracts.token_address"));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = CastLabConfig::default();
        config.listener.bind_address = "nope".to_string();
        config.funding.claim_timeout_secs = 0;
        config.funding.poll_interval_ms = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
