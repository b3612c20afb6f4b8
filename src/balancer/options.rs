//! Runtime options of a request balancer.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{BalancerConfig, PolicyKind, RetryMode, RetrySetting};
use crate::health::{HealthChangeHook, DEFAULT_RESET_TIME, DEFAULT_YELLOW_STATES};
use crate::load_balancer::health_check::probe_fn;
use crate::load_balancer::{Endpoint, HealthProbe, SelectionPolicy};
use crate::resilience::{Classify, FatalPolicy, RetryPolicy};

/// Notified of every failed attempt: `(fatal, error, endpoint)`.
pub type ExceptionHook<E, Er> = Arc<dyn Fn(bool, &Er, &E) + Send + Sync>;

/// Which selection policy the balancer runs.
pub enum PolicySpec<E: Endpoint, Er: Send + 'static> {
    RoundRobin,
    HealthCheck,
    Sticky,
    Custom(Box<dyn SelectionPolicy<E, Er>>),
}

impl<E: Endpoint, Er: Send + 'static> From<PolicyKind> for PolicySpec<E, Er> {
    fn from(kind: PolicyKind) -> Self {
        match kind {
            PolicyKind::RoundRobin => Self::RoundRobin,
            PolicyKind::HealthCheck => Self::HealthCheck,
            PolicyKind::Sticky => Self::Sticky,
        }
    }
}

impl<E: Endpoint, Er: Send + 'static> fmt::Debug for PolicySpec<E, Er> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RoundRobin => write!(f, "RoundRobin"),
            Self::HealthCheck => write!(f, "HealthCheck"),
            Self::Sticky => write!(f, "Sticky"),
            Self::Custom(p) => write!(f, "Custom({})", p.name()),
        }
    }
}

/// Everything a [`RequestBalancer`](crate::RequestBalancer) can be tuned with.
pub struct BalancerOptions<E: Endpoint, Er: Send + 'static> {
    pub policy: PolicySpec<E, Er>,
    pub retry: RetryPolicy<E>,
    pub fatal: FatalPolicy<Er>,
    pub on_exception: Option<ExceptionHook<E, Er>>,
    /// Probe used by the health-check policy; endpoints always pass without one.
    pub health_check: Option<HealthProbe<E, Er>>,
    pub on_health_change: Option<HealthChangeHook>,
    /// Re-resolve endpoints once the last resolution is older than this.
    pub resolve: Option<Duration>,
    pub yellow_states: u32,
    pub reset_time: Duration,
    /// Deadline applied to every `request()`.
    pub request_timeout: Option<Duration>,
}

impl<E: Endpoint, Er: Send + 'static> Default for BalancerOptions<E, Er> {
    fn default() -> Self {
        Self {
            policy: PolicySpec::RoundRobin,
            retry: RetryPolicy::default(),
            fatal: FatalPolicy::default(),
            on_exception: None,
            health_check: None,
            on_health_change: None,
            resolve: None,
            yellow_states: DEFAULT_YELLOW_STATES,
            reset_time: DEFAULT_RESET_TIME,
            request_timeout: None,
        }
    }
}

impl<E: Endpoint, Er: Classify + Send + 'static> BalancerOptions<E, Er> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options described by a configuration file. Hooks stay unset.
    pub fn from_config(config: &BalancerConfig) -> Self {
        let retry = match config.retry {
            RetrySetting::Enabled(enabled) => RetryPolicy::Enabled(enabled),
            RetrySetting::Attempts(n) => RetryPolicy::Attempts(n as usize),
            RetrySetting::Mode(RetryMode::EachEndpoint) => RetryPolicy::EachEndpoint,
        };
        Self {
            policy: config.policy.into(),
            retry,
            resolve: config.resolve.interval_secs.map(Duration::from_secs),
            yellow_states: config.health.yellow_states,
            reset_time: Duration::from_secs(config.health.reset_time_secs),
            request_timeout: config.request_timeout_secs.map(Duration::from_secs),
            ..Self::default()
        }
    }

    pub fn policy(mut self, policy: PolicySpec<E, Er>) -> Self {
        self.policy = policy;
        self
    }

    pub fn custom_policy<P: SelectionPolicy<E, Er> + 'static>(self, policy: P) -> Self {
        self.policy(PolicySpec::Custom(Box::new(policy)))
    }

    pub fn retry(mut self, retry: RetryPolicy<E>) -> Self {
        self.retry = retry;
        self
    }

    pub fn fatal(mut self, fatal: FatalPolicy<Er>) -> Self {
        self.fatal = fatal;
        self
    }

    pub fn on_exception<F>(mut self, f: F) -> Self
    where
        F: Fn(bool, &Er, &E) + Send + Sync + 'static,
    {
        self.on_exception = Some(Arc::new(f));
        self
    }

    pub fn health_check<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, Er>> + Send + 'static,
    {
        self.health_check = Some(probe_fn(f));
        self
    }

    pub fn on_health_change<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_health_change = Some(Arc::new(f));
        self
    }

    pub fn resolve_every(mut self, interval: Duration) -> Self {
        self.resolve = Some(interval);
        self
    }

    pub fn yellow_states(mut self, yellow_states: u32) -> Self {
        self.yellow_states = yellow_states;
        self
    }

    pub fn reset_time(mut self, reset_time: Duration) -> Self {
        self.reset_time = reset_time;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}

impl<E: Endpoint, Er: Send + 'static> fmt::Debug for BalancerOptions<E, Er> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BalancerOptions")
            .field("policy", &self.policy)
            .field("retry", &self.retry)
            .field("fatal", &self.fatal)
            .field("on_exception", &self.on_exception.is_some())
            .field("health_check", &self.health_check.is_some())
            .field("on_health_change", &self.on_health_change.is_some())
            .field("resolve", &self.resolve)
            .field("yellow_states", &self.yellow_states)
            .field("reset_time", &self.reset_time)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}
