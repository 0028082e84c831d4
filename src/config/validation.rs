//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses parse and limits are non-zero
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: EndpointConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::EndpointConfig;
use crate::endpoint::InputAddress;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("endpoint.input_address `{0}` is not a valid address")]
    InputAddress(String),

    #[error("transport.bind_address `{0}` is not a socket address")]
    BindAddress(String),

    #[error("observability.metrics_address `{0}` is not a socket address")]
    MetricsAddress(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &EndpointConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if InputAddress::parse(&config.endpoint.input_address).is_err() {
        errors.push(ValidationError::InputAddress(config.endpoint.input_address.clone()));
    }
    if config.endpoint.concurrency_limit == 0 {
        errors.push(ValidationError::Zero("endpoint.concurrency_limit"));
    }
    if config.transport.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.transport.bind_address.clone()));
    }
    if config.transport.max_connections == 0 {
        errors.push(ValidationError::Zero("transport.max_connections"));
    }
    if config.transport.max_frame_bytes == 0 {
        errors.push(ValidationError::Zero("transport.max_frame_bytes"));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
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
    fn defaults_are_valid() {
        assert_eq!(validate_config(&EndpointConfig::default()), Ok(()));
    }

    #[test]
    fn reports_every_problem() {
        let mut config = EndpointConfig::default();
        config.endpoint.input_address = "not a url".into();
        config.transport.bind_address = "localhost".into();
        config.transport.max_connections = 0;
        config.transport.max_frame_bytes = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::InputAddress("not a url".into()),
                ValidationError::BindAddress("localhost".into()),
                ValidationError::Zero("transport.max_connections"),
                ValidationError::Zero("transport.max_frame_bytes"),
            ]
        );
    }

    #[test]
    fn metrics_address_checked_only_when_enabled() {
        let mut config = EndpointConfig::default();
        config.observability.metrics_address = "nowhere".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::MetricsAddress("nowhere".into())])
        );
    }
}
