//! Client-side request balancing across redundant endpoints.
//!
//! A [`RequestBalancer`] picks an endpoint through a pluggable
//! [`SelectionPolicy`], runs the caller's request against it and moves on
//! to the next endpoint when the attempt fails with a retryable error.

pub mod balancer;
pub mod config;
pub mod discovery;
pub mod health;
pub mod load_balancer;
pub mod observability;
pub mod resilience;

pub use balancer::{BalancerError, BalancerOptions, NoResultError, PolicySpec, RequestBalancer};
pub use config::{load_config, BalancerConfig, ConfigError};
pub use discovery::{DnsResolver, ResolveError, Resolver};
pub use health::{HealthSettings, HealthTracker};
pub use load_balancer::{Endpoint, HealthCheck, RoundRobin, Selection, SelectionPolicy, Sticky};
pub use resilience::{AttemptError, Classify, ErrorCategory, FatalPolicy, RetryPolicy};
