//! Sticky selection strategy.
//!
//! # Responsibilities
//! - Keep sending traffic to one endpoint while it works
//! - Move on to the next endpoint once the pinned one fails
//! - Keep the pin across endpoint list replacements when possible

use std::sync::Mutex;

use tokio::time::Instant;

use crate::load_balancer::{dedup, Endpoint, Selection, SelectionPolicy};

#[derive(Debug)]
struct Pin<E> {
    endpoints: Vec<E>,
    counter: usize,
}

impl<E: Endpoint> Pin<E> {
    fn current(&self) -> Option<&E> {
        if self.endpoints.is_empty() {
            None
        } else {
            Some(&self.endpoints[self.counter % self.endpoints.len()])
        }
    }
}

/// Pins one endpoint until it fails.
///
/// Every selection asks for a probe; the policy itself always passes it.
#[derive(Debug)]
pub struct Sticky<E> {
    pin: Mutex<Pin<E>>,
}

impl<E: Endpoint> Sticky<E> {
    pub fn new() -> Self {
        Self::starting_at(fastrand::usize(..0xffff))
    }

    /// Pin `endpoints[counter % len]` on the first `set_endpoints`.
    pub fn starting_at(counter: usize) -> Self {
        Self {
            pin: Mutex::new(Pin {
                endpoints: Vec::new(),
                counter,
            }),
        }
    }

    /// The endpoint currently pinned.
    pub fn pinned(&self) -> Option<E> {
        self.pin
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .current()
            .cloned()
    }
}

impl<E: Endpoint> Default for Sticky<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Endpoint, Er: Send + 'static> SelectionPolicy<E, Er> for Sticky<E> {
    fn name(&self) -> &'static str {
        "sticky"
    }

    fn next(&self) -> Option<Selection<E>> {
        let pin = self.pin.lock().unwrap_or_else(|e| e.into_inner());
        pin.current().map(|endpoint| Selection::new(endpoint.clone(), true))
    }

    fn good(&self, _endpoint: &E, _started: Instant, _finished: Instant) {}

    fn bad(&self, endpoint: &E, _started: Instant, _finished: Instant) {
        let mut pin = self.pin.lock().unwrap_or_else(|e| e.into_inner());
        // Concurrent failures of the same pin only move it once.
        if pin.current() == Some(endpoint) {
            pin.counter = pin.counter.wrapping_add(1);
            if let Some(next) = pin.current() {
                tracing::info!(failed = %endpoint, pinned = %next, "Moving sticky endpoint");
            }
        }
    }

    fn set_endpoints(&self, endpoints: &[E]) {
        let mut pin = self.pin.lock().unwrap_or_else(|e| e.into_inner());
        let endpoints = dedup(endpoints);
        match pin.current().cloned() {
            Some(pinned) if endpoints.contains(&pinned) => {
                let mut ordered = vec![pinned.clone()];
                ordered.extend(endpoints.into_iter().filter(|e| *e != pinned));
                pin.endpoints = ordered;
                pin.counter = 0;
            }
            _ => pin.endpoints = endpoints,
        }
    }
}
