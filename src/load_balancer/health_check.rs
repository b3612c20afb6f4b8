//! Health-aware round-robin strategy.
//!
//! # Responsibilities
//! - Rotate fairly over the endpoints a [`HealthTracker`] considers usable
//! - Ask for a probe before trusting an endpoint that is not green
//! - Feed request and probe outcomes back into the tracker

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::time::Instant;

use crate::health::{HealthSettings, HealthTracker};
use crate::load_balancer::{dedup, Endpoint, Selection, SelectionPolicy};

/// Out-of-band check run against a recovering endpoint.
pub type HealthProbe<E, Er> = Arc<dyn Fn(E) -> BoxFuture<'static, Result<bool, Er>> + Send + Sync>;

/// Wrap an async closure into a [`HealthProbe`].
pub fn probe_fn<E, Er, F, Fut>(f: F) -> HealthProbe<E, Er>
where
    F: Fn(E) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<bool, Er>> + Send + 'static,
{
    Arc::new(move |endpoint| f(endpoint).boxed())
}

#[derive(Debug)]
struct Cursor {
    counter: usize,
    last_size: usize,
    seeded: bool,
}

/// Round-robin over green and yellow endpoints, skipping red ones.
pub struct HealthCheck<E, Er> {
    tracker: HealthTracker<E>,
    cursor: Mutex<Cursor>,
    probe: Option<HealthProbe<E, Er>>,
}

impl<E: Endpoint, Er: Send + 'static> HealthCheck<E, Er> {
    /// A policy with no endpoints yet; the first `set_endpoints` seeds them green.
    pub fn new(settings: HealthSettings, probe: Option<HealthProbe<E, Er>>) -> Self {
        Self {
            tracker: HealthTracker::new(&[], settings),
            cursor: Mutex::new(Cursor {
                counter: 0,
                last_size: 0,
                seeded: false,
            }),
            probe,
        }
    }

    pub fn tracker(&self) -> &HealthTracker<E> {
        &self.tracker
    }

    fn report(&self, endpoint: &E, healthy: bool, at: Instant) {
        let result = if healthy {
            self.tracker.improve(endpoint, at)
        } else {
            self.tracker.worsen(endpoint, at)
        };
        if let Err(e) = result {
            // The set was replaced while this endpoint was in flight.
            tracing::warn!(endpoint = %endpoint, error = %e, "Dropping health report");
        }
    }
}

impl<E: Endpoint, Er: Send + 'static> SelectionPolicy<E, Er> for HealthCheck<E, Er> {
    fn name(&self) -> &'static str {
        "health_check"
    }

    fn next(&self) -> Option<Selection<E>> {
        let usable = self.tracker.usable_endpoints();
        if usable.is_empty() {
            tracing::debug!("No usable endpoints left");
            return None;
        }

        let mut cursor = self.cursor.lock().unwrap_or_else(|e| e.into_inner());
        // When endpoints dropped out the current index already points at the next one.
        if usable.len() >= cursor.last_size {
            cursor.counter += 1;
        }
        if cursor.counter >= usable.len() {
            cursor.counter = 0;
        }
        cursor.last_size = usable.len();

        let (endpoint, level) = usable[cursor.counter].clone();
        Some(Selection::new(endpoint, level != 0))
    }

    fn good(&self, endpoint: &E, _started: Instant, finished: Instant) {
        self.report(endpoint, true, finished);
    }

    fn bad(&self, endpoint: &E, _started: Instant, finished: Instant) {
        self.report(endpoint, false, finished);
    }

    fn set_endpoints(&self, endpoints: &[E]) {
        let endpoints = dedup(endpoints);
        if endpoints.is_empty() {
            return;
        }

        let mut cursor = self.cursor.lock().unwrap_or_else(|e| e.into_inner());
        if cursor.seeded {
            self.tracker.register(&endpoints);
        } else {
            self.tracker.reset(&endpoints);
            cursor.seeded = true;
        }
        cursor.counter = fastrand::usize(..0xffff) % endpoints.len();
        cursor.last_size = endpoints.len();
    }

    fn health_check<'a>(&'a self, endpoint: &'a E) -> BoxFuture<'a, Result<bool, Er>> {
        Box::pin(async move {
            let Some(probe) = &self.probe else {
                self.report(endpoint, true, Instant::now());
                return Ok(true);
            };
            match probe(endpoint.clone()).await {
                Ok(healthy) => {
                    self.report(endpoint, healthy, Instant::now());
                    Ok(healthy)
                }
                Err(e) => {
                    self.report(endpoint, false, Instant::now());
                    Err(e)
                }
            }
        })
    }

    fn stats(&self) -> Option<HashMap<E, String>> {
        Some(self.tracker.stats())
    }
}

impl<E: Endpoint, Er> fmt::Debug for HealthCheck<E, Er> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthCheck")
            .field("tracker", &self.tracker)
            .field("probe", &self.probe.is_some())
            .finish()
    }
}
