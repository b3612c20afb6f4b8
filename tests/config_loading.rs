//! Configuration files driving a real balancer.

use std::path::PathBuf;
use std::time::Duration;

use endpoint_balancer::config::{load_config, ConfigError, PolicyKind, ValidationError};
use endpoint_balancer::{AttemptError, BalancerError, BalancerOptions, RequestBalancer, RetryPolicy};

mod common;
use common::{unavailable, CallLog};

/// Write `content` to a fresh file under the system temp dir.
fn write_config(content: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("endpoint-balancer-{}.toml", uuid::Uuid::new_v4()));
    std::fs::write(&path, content).unwrap();
    path
}

#[tokio::test]
async fn test_config_file_drives_balancer() {
    let path = write_config(
        r#"
        endpoints = ["10.0.0.1:80", "10.0.0.2:80", "10.0.0.3:80"]
        policy = "health_check"
        retry = 2

        [health]
        yellow_states = 2
        reset_time_secs = 30
        "#,
    );
    let config = load_config(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(config.policy, PolicyKind::HealthCheck);

    let options: BalancerOptions<String, AttemptError> = BalancerOptions::from_config(&config);
    assert!(matches!(options.retry, RetryPolicy::Attempts(2)));
    assert_eq!(options.reset_time, Duration::from_secs(30));

    let balancer = RequestBalancer::new(&config.endpoints, options).unwrap();
    let log = CallLog::new();
    let err = balancer
        .request(|endpoint| {
            log.record(endpoint);
            async { Err::<(), _>(unavailable()) }
        })
        .await
        .unwrap_err();

    assert_eq!(log.len(), 2);
    assert!(matches!(err, BalancerError::NoResult(_)));
    let yellow = balancer
        .get_stats()
        .into_iter()
        .filter(|(_, label)| label == "yellow-1")
        .count();
    assert_eq!(yellow, 2);
}

#[tokio::test]
async fn test_retry_disabled_in_file() {
    let path = write_config(
        r#"
        endpoints = ["a:1", "b:2"]
        retry = false
        "#,
    );
    let config = load_config(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    let options: BalancerOptions<String, AttemptError> = BalancerOptions::from_config(&config);
    let balancer = RequestBalancer::new(&config.endpoints, options).unwrap();
    let log = CallLog::new();
    let _ = balancer
        .request(|endpoint| {
            log.record(endpoint);
            async { Err::<(), _>(unavailable()) }
        })
        .await;

    assert_eq!(log.len(), 1);
}

#[test]
fn test_minimal_file_uses_defaults() {
    let path = write_config(r#"endpoints = ["a:1"]"#);
    let config = load_config(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(config.policy, PolicyKind::RoundRobin);
    assert_eq!(config.health.yellow_states, 4);
    assert_eq!(config.health.reset_time_secs, 60);
    assert_eq!(config.resolve.interval_secs, None);
    assert_eq!(config.observability.log_level, "info");

    let options: BalancerOptions<String, AttemptError> = BalancerOptions::from_config(&config);
    assert!(matches!(options.retry, RetryPolicy::EachEndpoint));
}

#[test]
fn test_invalid_file_reports_every_problem() {
    let path = write_config(
        r#"
        endpoints = []

        [health]
        yellow_states = 0

        [resolve]
        interval_secs = 0
        "#,
    );
    let err = load_config(&path).unwrap_err();
    std::fs::remove_file(&path).unwrap();

    match err {
        ConfigError::Validation(errors) => assert_eq!(
            errors,
            vec![
                ValidationError::NoEndpoints,
                ValidationError::NoYellowStates,
                ValidationError::ZeroResolveInterval,
            ]
        ),
        other => panic!("expected validation errors, got {other}"),
    }
}

#[test]
fn test_unknown_policy_is_a_parse_error() {
    let path = write_config(
        r#"
        endpoints = ["a:1"]
        policy = "random"
        "#,
    );
    let err = load_config(&path).unwrap_err();
    std::fs::remove_file(&path).unwrap();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_missing_file() {
    let path = std::env::temp_dir().join(format!("missing-{}.toml", uuid::Uuid::new_v4()));
    assert!(matches!(load_config(&path), Err(ConfigError::Io(_))));
}

#[test]
fn test_resolve_interval_needs_resolver() {
    let path = write_config(
        r#"
        endpoints = ["svc:80"]

        [resolve]
        interval_secs = 15
        "#,
    );
    let config = load_config(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    let options: BalancerOptions<String, AttemptError> = BalancerOptions::from_config(&config);
    let err = RequestBalancer::new(&config.endpoints, options).unwrap_err();
    assert!(matches!(err, ConfigError::MissingResolver));
}
