//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (levels >= 1, intervals > 0)
//! - Check addresses and names the binary will need
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BalancerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::BalancerConfig;
use crate::observability::logging::LOG_LEVELS;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("at least one endpoint is required")]
    NoEndpoints,

    #[error("endpoint #{0} is blank")]
    BlankEndpoint(usize),

    #[error("health.yellow_states must be at least 1")]
    NoYellowStates,

    #[error("health.reset_time_secs must be greater than 0")]
    ZeroResetTime,

    #[error("health.probe_path must start with '/': {0}")]
    RelativeProbePath(String),

    #[error("resolve.interval_secs must be greater than 0")]
    ZeroResolveInterval,

    #[error("resolve.attempts must be at least 1")]
    NoResolveAttempts,

    #[error("request_timeout_secs must be greater than 0")]
    ZeroRequestTimeout,

    #[error("unknown log level: {0}")]
    UnknownLogLevel(String),

    #[error("invalid metrics address: {0}")]
    InvalidMetricsAddress(String),
}

/// Check everything serde cannot.
pub fn validate_config(config: &BalancerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.endpoints.is_empty() {
        errors.push(ValidationError::NoEndpoints);
    }
    for (i, endpoint) in config.endpoints.iter().enumerate() {
        if endpoint.trim().is_empty() {
            errors.push(ValidationError::BlankEndpoint(i));
        }
    }

    if config.health.yellow_states == 0 {
        errors.push(ValidationError::NoYellowStates);
    }
    if config.health.reset_time_secs == 0 {
        errors.push(ValidationError::ZeroResetTime);
    }
    if let Some(path) = &config.health.probe_path {
        if !path.starts_with('/') {
            errors.push(ValidationError::RelativeProbePath(path.clone()));
        }
    }

    if config.resolve.interval_secs == Some(0) {
        errors.push(ValidationError::ZeroResolveInterval);
    }
    if config.resolve.attempts == 0 {
        errors.push(ValidationError::NoResolveAttempts);
    }
    if config.request_timeout_secs == Some(0) {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::UnknownLogLevel(config.observability.log_level.clone()));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
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

    fn valid() -> BalancerConfig {
        BalancerConfig {
            endpoints: vec!["http://a:80".to_string()],
            ..BalancerConfig::default()
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn test_all_errors_reported() {
        let mut config = valid();
        config.endpoints = vec![];
        config.health.yellow_states = 0;
        config.resolve.interval_secs = Some(0);
        config.observability.log_level = "loud".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::NoEndpoints,
                ValidationError::NoYellowStates,
                ValidationError::ZeroResolveInterval,
                ValidationError::UnknownLogLevel("loud".to_string()),
            ]
        );
    }

    #[test]
    fn test_blank_endpoint() {
        let mut config = valid();
        config.endpoints.push("  ".to_string());
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::BlankEndpoint(1)]
        );
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = valid();
        config.observability.metrics_address = "nowhere".to_string();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::InvalidMetricsAddress("nowhere".to_string())]
        );
    }
}
