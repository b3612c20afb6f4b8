//! Configuration schema definitions.
//!
//! This module defines the file format of a balancer configuration.
//! All types derive Serde traits for deserialization from TOML.

use serde::{Deserialize, Serialize};

/// Root configuration of a request balancer.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct BalancerConfig {
    /// Endpoints requests are spread over (URLs or `host:port`).
    pub endpoints: Vec<String>,

    /// Selection strategy.
    pub policy: PolicyKind,

    /// Retry budget of a single request.
    pub retry: RetrySetting,

    /// Health state machine settings.
    pub health: HealthConfig,

    /// DNS re-resolution settings.
    pub resolve: ResolveConfig,

    /// Deadline applied to every request, in seconds.
    pub request_timeout_secs: Option<u64>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Selection strategy name.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    #[default]
    RoundRobin,
    HealthCheck,
    Sticky,
}

/// `retry = "each_endpoint" | <attempts> | <bool>`.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum RetrySetting {
    Enabled(bool),
    Attempts(u32),
    Mode(RetryMode),
}

impl Default for RetrySetting {
    fn default() -> Self {
        Self::Mode(RetryMode::EachEndpoint)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RetryMode {
    EachEndpoint,
}

/// Health state machine configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HealthConfig {
    /// Steps between green and red.
    pub yellow_states: u32,

    /// Idle seconds after which an endpoint recovers one level.
    pub reset_time_secs: u64,

    /// Path probed (HTTP GET) before trusting a recovering endpoint.
    pub probe_path: Option<String>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            yellow_states: 4,
            reset_time_secs: 60,
            probe_path: None,
        }
    }
}

/// DNS re-resolution configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ResolveConfig {
    /// Re-resolve when the last resolution is older than this many seconds.
    /// Resolution is off when unset.
    pub interval_secs: Option<u64>,

    /// Lookup attempts per endpoint.
    pub attempts: u32,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            interval_secs: None,
            attempts: 3,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BalancerConfig::default();
        assert_eq!(config.policy, PolicyKind::RoundRobin);
        assert_eq!(config.retry, RetrySetting::Mode(RetryMode::EachEndpoint));
        assert_eq!(config.health.yellow_states, 4);
        assert_eq!(config.health.reset_time_secs, 60);
        assert!(config.resolve.interval_secs.is_none());
    }

    #[test]
    fn test_retry_forms() {
        #[derive(Deserialize)]
        struct Wrapper {
            retry: RetrySetting,
        }

        let parsed: Wrapper = toml::from_str("retry = 5").unwrap();
        assert_eq!(parsed.retry, RetrySetting::Attempts(5));

        let parsed: Wrapper = toml::from_str("retry = false").unwrap();
        assert_eq!(parsed.retry, RetrySetting::Enabled(false));

        let parsed: Wrapper = toml::from_str("retry = \"each_endpoint\"").unwrap();
        assert_eq!(parsed.retry, RetrySetting::Mode(RetryMode::EachEndpoint));
    }

    #[test]
    fn test_minimal_file() {
        let config: BalancerConfig = toml::from_str(
            r#"
            endpoints = ["http://a:80", "http://b:80"]
            policy = "health_check"

            [health]
            yellow_states = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.endpoints.len(), 2);
        assert_eq!(config.policy, PolicyKind::HealthCheck);
        assert_eq!(config.health.yellow_states, 3);
        assert_eq!(config.health.reset_time_secs, 60);
    }
}
