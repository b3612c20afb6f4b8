//! Endpoint selection subsystem.
//!
//! # Data Flow
//! ```text
//! RequestBalancer asks for a candidate
//!     → SelectionPolicy::next()
//!         - round_robin.rs (health-agnostic rotation)
//!         - health_check.rs (rotation over non-red endpoints of a HealthTracker)
//!         - sticky.rs (pin one endpoint until it fails)
//!     → (endpoint, needs_probe)
//!     → optional SelectionPolicy::health_check(endpoint)
//!     → request outcome reported back via good()/bad()
//! ```
//!
//! # Design Decisions
//! - Policies own their mutable state behind a mutex; every method takes `&self`
//!   so one policy can serve concurrent requests
//! - No lock is held across a probe await
//! - Policies without a health concept report no stats and always pass probes

pub mod health_check;
pub mod round_robin;
pub mod sticky;

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use futures_util::future::BoxFuture;
use tokio::time::Instant;

pub use health_check::{HealthCheck, HealthProbe};
pub use round_robin::RoundRobin;
pub use sticky::Sticky;

/// Anything requests can be sent to: a URL, a `host:port`, an id.
///
/// The balancer only compares, hashes, clones and prints endpoints.
pub trait Endpoint: Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static {}

impl<T> Endpoint for T where T: Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static {}

/// A candidate returned by [`SelectionPolicy::next`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection<E> {
    pub endpoint: E,
    /// Run [`SelectionPolicy::health_check`] before trusting the endpoint.
    pub needs_probe: bool,
}

impl<E> Selection<E> {
    pub fn new(endpoint: E, needs_probe: bool) -> Self {
        Self { endpoint, needs_probe }
    }
}

/// Pluggable endpoint selection and health feedback.
pub trait SelectionPolicy<E: Endpoint, Er: Send + 'static>: Send + Sync {
    /// Short policy name used in logs.
    fn name(&self) -> &'static str;

    /// Next candidate, or `None` when no endpoint is usable.
    fn next(&self) -> Option<Selection<E>>;

    /// The request sent to `endpoint` between `started` and `finished` succeeded.
    fn good(&self, endpoint: &E, started: Instant, finished: Instant);

    /// The request sent to `endpoint` between `started` and `finished` failed.
    fn bad(&self, endpoint: &E, started: Instant, finished: Instant);

    /// Replace the endpoint set, keeping whatever state is known for survivors.
    fn set_endpoints(&self, endpoints: &[E]);

    /// Probe `endpoint` before it gets a real request.
    fn health_check<'a>(&'a self, _endpoint: &'a E) -> BoxFuture<'a, Result<bool, Er>> {
        Box::pin(std::future::ready(Ok(true)))
    }

    /// Per-endpoint health labels, if this policy tracks health.
    fn stats(&self) -> Option<HashMap<E, String>> {
        None
    }
}

/// Copy `endpoints` dropping repeats, first occurrence wins.
pub(crate) fn dedup<E: Endpoint>(endpoints: &[E]) -> Vec<E> {
    let mut unique: Vec<E> = Vec::with_capacity(endpoints.len());
    for endpoint in endpoints {
        if !unique.contains(endpoint) {
            unique.push(endpoint.clone());
        }
    }
    unique
}
