//! The balanced request loop.
//!
//! # Responsibilities
//! - Own the selection policy and the active endpoint set
//! - Run one request across endpoints until success, a fatal error,
//!   an exhausted retry budget or the deadline
//! - Keep resolved addresses fresh when a resolve interval is set

use std::fmt;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::balancer::error::{record_failure, BalancerError, FailureHistory, NoResultError};
use crate::balancer::options::{BalancerOptions, ExceptionHook, PolicySpec};
use crate::config::ConfigError;
use crate::discovery::{ResolveError, Resolver};
use crate::health::{HealthSettings, UNTRACKED_LABEL};
use crate::load_balancer::{dedup, Endpoint, HealthCheck, RoundRobin, Selection, SelectionPolicy, Sticky};
use crate::observability::metrics::{self, AttemptOutcome};
use crate::resilience::{timeouts, Classify, FatalPolicy, RetryPolicy};

struct ResolveState<E> {
    /// Endpoints as configured, before resolution.
    configured: Vec<E>,
    resolved_at: Instant,
}

struct Resolution<E> {
    resolver: Box<dyn Resolver<E>>,
    interval: Option<Duration>,
    state: tokio::sync::Mutex<ResolveState<E>>,
}

/// Spreads requests over a set of endpoints, retrying on the next one.
///
/// One balancer is meant to be shared by every request to the same
/// service; all methods take `&self`.
pub struct RequestBalancer<E: Endpoint, Er: Send + 'static> {
    policy: Box<dyn SelectionPolicy<E, Er>>,
    retry: RetryPolicy<E>,
    fatal: FatalPolicy<Er>,
    on_exception: Option<ExceptionHook<E, Er>>,
    request_timeout: Option<Duration>,
    active: Mutex<Vec<E>>,
    resolution: Option<Resolution<E>>,
}

impl<E, Er> RequestBalancer<E, Er>
where
    E: Endpoint,
    Er: Classify + fmt::Display + Send + 'static,
{
    /// A balancer over `endpoints` as given.
    ///
    /// Fails when the list is empty, when an option is out of range, or
    /// when a resolve interval is set (use [`RequestBalancer::with_resolver`]).
    pub fn new(endpoints: &[E], options: BalancerOptions<E, Er>) -> Result<Self, ConfigError> {
        check_options(endpoints, &options)?;
        if options.resolve.is_some() {
            return Err(ConfigError::MissingResolver);
        }
        Ok(Self::build(dedup(endpoints), options, None))
    }

    /// A balancer over the addresses `resolver` expands `endpoints` into.
    ///
    /// The first resolution happens here; a failure or an empty result is
    /// returned as an error. When
    /// `options.resolve` is set, later requests re-resolve once the
    /// addresses are older than that interval.
    pub async fn with_resolver<R>(
        endpoints: &[E],
        options: BalancerOptions<E, Er>,
        resolver: R,
    ) -> Result<Self, ConfigError>
    where
        R: Resolver<E> + 'static,
    {
        check_options(endpoints, &options)?;

        let configured = dedup(endpoints);
        let resolved = resolve_nonempty(&resolver, &configured).await?;
        tracing::info!(
            configured = configured.len(),
            resolved = resolved.len(),
            "Resolved endpoints"
        );
        metrics::record_resolution(resolved.len());

        let resolution = Resolution {
            resolver: Box::new(resolver),
            interval: options.resolve,
            state: tokio::sync::Mutex::new(ResolveState {
                configured,
                resolved_at: Instant::now(),
            }),
        };
        Ok(Self::build(resolved, options, Some(resolution)))
    }

    fn build(endpoints: Vec<E>, options: BalancerOptions<E, Er>, resolution: Option<Resolution<E>>) -> Self {
        let policy: Box<dyn SelectionPolicy<E, Er>> = match options.policy {
            PolicySpec::RoundRobin => Box::new(RoundRobin::<E>::new()),
            PolicySpec::HealthCheck => Box::new(HealthCheck::new(
                HealthSettings {
                    yellow_states: options.yellow_states,
                    reset_time: options.reset_time,
                    on_health_change: options.on_health_change,
                },
                options.health_check,
            )),
            PolicySpec::Sticky => Box::new(Sticky::<E>::new()),
            PolicySpec::Custom(policy) => policy,
        };
        policy.set_endpoints(&endpoints);
        tracing::debug!(policy = policy.name(), endpoints = endpoints.len(), "Balancer ready");

        Self {
            policy,
            retry: options.retry,
            fatal: options.fatal,
            on_exception: options.on_exception,
            request_timeout: options.request_timeout,
            active: Mutex::new(endpoints),
            resolution,
        }
    }

    /// Build a throw-away balancer and run a single request through it.
    pub async fn request_once<T, F, Fut>(
        endpoints: &[E],
        options: BalancerOptions<E, Er>,
        f: F,
    ) -> Result<T, BalancerError<E, Er>>
    where
        F: FnMut(E) -> Fut,
        Fut: Future<Output = Result<T, Er>>,
    {
        let balancer = Self::new(endpoints, options)?;
        balancer.request(f).await
    }

    /// Call `f` with endpoints chosen by the policy until one call succeeds.
    ///
    /// Returns the first success, the first fatal error unchanged, or a
    /// [`NoResultError`] carrying every retryable failure.
    pub async fn request<T, F, Fut>(&self, f: F) -> Result<T, BalancerError<E, Er>>
    where
        F: FnMut(E) -> Fut,
        Fut: Future<Output = Result<T, Er>>,
    {
        let deadline = self.request_timeout.map(|timeout| Instant::now() + timeout);
        self.instrumented(deadline, f).await
    }

    /// Like [`request`](Self::request), but gives up once `deadline` passes.
    pub async fn request_with_deadline<T, F, Fut>(
        &self,
        deadline: Instant,
        f: F,
    ) -> Result<T, BalancerError<E, Er>>
    where
        F: FnMut(E) -> Fut,
        Fut: Future<Output = Result<T, Er>>,
    {
        self.instrumented(Some(deadline), f).await
    }

    async fn instrumented<T, F, Fut>(&self, deadline: Option<Instant>, f: F) -> Result<T, BalancerError<E, Er>>
    where
        F: FnMut(E) -> Fut,
        Fut: Future<Output = Result<T, Er>>,
    {
        let span = tracing::info_span!("request", request_id = %Uuid::new_v4(), policy = self.policy.name());
        self.run(deadline, f).instrument(span).await
    }

    async fn run<T, F, Fut>(&self, deadline: Option<Instant>, mut f: F) -> Result<T, BalancerError<E, Er>>
    where
        F: FnMut(E) -> Fut,
        Fut: Future<Output = Result<T, Er>>,
    {
        self.refresh_resolution().await;
        let endpoints = self.endpoints();

        let mut attempts = 0usize;
        let mut history: FailureHistory<E, Er> = Vec::new();

        loop {
            if !self.retry.should_retry(&endpoints, attempts) {
                tracing::debug!(attempts, "Retry budget spent");
                break;
            }
            if timeouts::expired(deadline) {
                return Err(deadline_exceeded(attempts, history));
            }
            let Some(Selection { endpoint, needs_probe }) = self.policy.next() else {
                tracing::warn!(attempts, "No usable endpoint left");
                break;
            };
            attempts += 1;

            if needs_probe {
                let probe = timeouts::within(deadline, self.policy.health_check(&endpoint)).await;
                match probe {
                    Err(_) => {
                        tracing::warn!(endpoint = %endpoint, attempt = attempts, "Deadline passed during probe");
                        return Err(deadline_exceeded(attempts, history));
                    }
                    Ok(Ok(true)) => {
                        tracing::info!(endpoint = %endpoint, attempt = attempts, "Probe passed");
                    }
                    Ok(Ok(false)) => {
                        tracing::warn!(endpoint = %endpoint, attempt = attempts, "Probe reported unhealthy, skipping");
                        metrics::record_attempt(AttemptOutcome::ProbeFailed);
                        continue;
                    }
                    Ok(Err(e)) => {
                        if self.fatal.is_fatal(&e) {
                            tracing::error!(endpoint = %endpoint, attempt = attempts, error = %e, "Probe failed fatally");
                            metrics::record_attempt(AttemptOutcome::Fatal);
                            return Err(BalancerError::Fatal { endpoint, source: e });
                        }
                        tracing::warn!(endpoint = %endpoint, attempt = attempts, error = %e, "Probe failed, skipping");
                        metrics::record_attempt(AttemptOutcome::ProbeFailed);
                        record_failure(&mut history, endpoint, e);
                        continue;
                    }
                }
            }

            let started = Instant::now();
            let outcome = timeouts::within(deadline, f(endpoint.clone())).await;
            let finished = Instant::now();

            match outcome {
                Err(_) => {
                    tracing::warn!(endpoint = %endpoint, attempt = attempts, "Deadline passed during attempt");
                    return Err(deadline_exceeded(attempts, history));
                }
                Ok(Ok(value)) => {
                    self.policy.good(&endpoint, started, finished);
                    metrics::record_attempt(AttemptOutcome::Success);
                    return Ok(value);
                }
                Ok(Err(e)) => {
                    let fatal = self.fatal.is_fatal(&e);
                    if let Some(hook) = &self.on_exception {
                        hook(fatal, &e, &endpoint);
                    }
                    if fatal {
                        tracing::error!(endpoint = %endpoint, attempt = attempts, error = %e, "Fatal error, giving up");
                        metrics::record_attempt(AttemptOutcome::Fatal);
                        return Err(BalancerError::Fatal { endpoint, source: e });
                    }
                    self.policy.bad(&endpoint, started, finished);
                    tracing::warn!(endpoint = %endpoint, attempt = attempts, error = %e, "Attempt failed, trying next endpoint");
                    metrics::record_attempt(AttemptOutcome::Retryable);
                    record_failure(&mut history, endpoint, e);
                }
            }
        }

        let err = NoResultError::new(attempts, history);
        tracing::error!(attempts, endpoints = err.endpoint_count(), "{}", err);
        metrics::record_exhausted();
        Err(err.into())
    }

    /// Re-resolve when the last resolution is older than the interval.
    ///
    /// A failed lookup or an empty result keeps the previous addresses.
    async fn refresh_resolution(&self) {
        let Some(resolution) = &self.resolution else {
            return;
        };
        let Some(interval) = resolution.interval else {
            return;
        };

        let mut state = resolution.state.lock().await;
        let now = Instant::now();
        if now.duration_since(state.resolved_at) <= interval {
            return;
        }

        match resolve_nonempty(resolution.resolver.as_ref(), &state.configured).await {
            Ok(resolved) => {
                tracing::info!(resolved = resolved.len(), "Re-resolved endpoints");
                metrics::record_resolution(resolved.len());
                self.install(resolved);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Re-resolution failed, keeping previous addresses");
            }
        }
        state.resolved_at = now;
    }

    fn install(&self, endpoints: Vec<E>) {
        self.policy.set_endpoints(&endpoints);
        *self.active.lock().unwrap_or_else(|e| e.into_inner()) = endpoints;
    }

    /// Replace the endpoint set, keeping known health of survivors.
    ///
    /// With a resolver the new list is resolved right away.
    pub async fn set_endpoints(&self, endpoints: &[E]) -> Result<(), ConfigError> {
        let endpoints = dedup(endpoints);
        if endpoints.is_empty() {
            return Err(ConfigError::EmptyEndpoints);
        }

        match &self.resolution {
            Some(resolution) => {
                let mut state = resolution.state.lock().await;
                let resolved = resolve_nonempty(resolution.resolver.as_ref(), &endpoints).await?;
                metrics::record_resolution(resolved.len());
                self.install(resolved);
                state.configured = endpoints;
                state.resolved_at = Instant::now();
            }
            None => self.install(endpoints),
        }
        tracing::info!(endpoints = self.endpoints().len(), "Endpoint set replaced");
        Ok(())
    }

    /// Endpoints requests currently go to (resolved addresses when resolving).
    pub fn endpoints(&self) -> Vec<E> {
        self.active.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Health label of every active endpoint, in endpoint order.
    ///
    /// Policies that do not track health report `n/a`.
    pub fn get_stats(&self) -> Vec<(E, String)> {
        let mut stats = self.policy.stats().unwrap_or_default();
        self.endpoints()
            .into_iter()
            .map(|endpoint| {
                let label = stats
                    .remove(&endpoint)
                    .unwrap_or_else(|| UNTRACKED_LABEL.to_string());
                (endpoint, label)
            })
            .collect()
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }
}

fn deadline_exceeded<E, Er>(attempts: usize, details: FailureHistory<E, Er>) -> BalancerError<E, Er> {
    metrics::record_attempt(AttemptOutcome::DeadlineExceeded);
    BalancerError::DeadlineExceeded { attempts, details }
}

/// Resolve and de-duplicate, treating an empty result as a lookup failure.
async fn resolve_nonempty<E: Endpoint, R: Resolver<E> + ?Sized>(
    resolver: &R,
    endpoints: &[E],
) -> Result<Vec<E>, ResolveError> {
    let resolved = dedup(&resolver.resolve(endpoints).await?);
    if resolved.is_empty() {
        return Err(ResolveError::NoAddresses);
    }
    Ok(resolved)
}

fn check_options<E: Endpoint, Er: Send + 'static>(endpoints: &[E], options: &BalancerOptions<E, Er>) -> Result<(), ConfigError> {
    if endpoints.is_empty() {
        return Err(ConfigError::EmptyEndpoints);
    }
    if options.yellow_states == 0 {
        return Err(ConfigError::InvalidYellowStates);
    }
    if options.resolve.is_some_and(|interval| interval.is_zero()) {
        return Err(ConfigError::InvalidOption("resolve interval must be greater than zero".into()));
    }
    if options.request_timeout.is_some_and(|timeout| timeout.is_zero()) {
        return Err(ConfigError::InvalidOption("request timeout must be greater than zero".into()));
    }
    if matches!(options.retry, RetryPolicy::Attempts(0)) {
        return Err(ConfigError::InvalidOption("retry cap must be at least 1".into()));
    }
    Ok(())
}

impl<E: Endpoint, Er: Send + 'static> fmt::Debug for RequestBalancer<E, Er> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBalancer")
            .field("policy", &self.policy.name())
            .field("retry", &self.retry)
            .field("fatal", &self.fatal)
            .field("request_timeout", &self.request_timeout)
            .field("resolving", &self.resolution.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::AttemptError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Balancer = RequestBalancer<&'static str, AttemptError>;

    #[test]
    fn test_rejects_bad_options() {
        let err = Balancer::new(&[], BalancerOptions::default()).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyEndpoints));

        let err = Balancer::new(&["a"], BalancerOptions::default().yellow_states(0)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidYellowStates));

        let err = Balancer::new(&["a"], BalancerOptions::default().retry(RetryPolicy::Attempts(0))).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOption(_)));

        let err = Balancer::new(&["a"], BalancerOptions::default().resolve_every(Duration::from_secs(15))).unwrap_err();
        assert!(matches!(err, ConfigError::MissingResolver));
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let balancer = Balancer::new(&["a", "b"], BalancerOptions::default()).unwrap();
        let calls = AtomicUsize::new(0);

        let value = balancer
            .request(|endpoint| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok::<_, AttemptError>(endpoint.len()) }
            })
            .await
            .unwrap();

        assert_eq!(value, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_disabled_stops_after_first_attempt() {
        let balancer = Balancer::new(&["a", "b", "c"], BalancerOptions::default().retry(RetryPolicy::Enabled(false))).unwrap();

        let err = balancer
            .request(|_| async { Err::<(), _>(AttemptError::Timeout("slow".into())) })
            .await
            .unwrap_err();

        match err {
            BalancerError::NoResult(e) => assert_eq!(e.attempts(), 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_endpoints_collapse() {
        let balancer = Balancer::new(&["a", "a", "b"], BalancerOptions::default()).unwrap();
        assert_eq!(balancer.endpoints(), vec!["a", "b"]);

        let err = balancer
            .request(|_| async { Err::<(), _>(AttemptError::Connection("refused".into())) })
            .await
            .unwrap_err();
        match err {
            BalancerError::NoResult(e) => assert_eq!(e.attempts(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }
}
