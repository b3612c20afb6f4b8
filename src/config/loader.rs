//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::BalancerConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::discovery::ResolveError;

/// Error type for configuration loading and balancer construction.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    /// A balancer needs at least one endpoint.
    #[error("endpoint list must not be empty")]
    EmptyEndpoints,

    #[error("yellow_states must be at least 1")]
    InvalidYellowStates,

    #[error("invalid option: {0}")]
    InvalidOption(String),

    /// `resolve` was set but no resolver was given.
    #[error("resolve interval configured without a resolver")]
    MissingResolver,

    #[error("initial resolution failed: {0}")]
    Resolve(#[from] ResolveError),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<BalancerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<BalancerConfig, ConfigError> {
    let config: BalancerConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error() {
        let err = parse_config("endpoints = [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation_error_lists_everything() {
        let err = parse_config("[health]\nyellow_states = 0").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("at least one endpoint"));
        assert!(message.contains("yellow_states"));
    }
}
