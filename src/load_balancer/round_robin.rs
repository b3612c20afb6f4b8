//! Round-robin selection strategy.

use std::sync::Mutex;

use tokio::time::Instant;

use crate::load_balancer::{dedup, Endpoint, Selection, SelectionPolicy};

/// Round-robin selector.
/// Stores an internal counter to rotate through endpoints; health is ignored.
#[derive(Debug)]
pub struct RoundRobin<E> {
    state: Mutex<RotationState<E>>,
}

#[derive(Debug)]
struct RotationState<E> {
    endpoints: Vec<E>,
    counter: usize,
}

impl<E: Endpoint> RoundRobin<E> {
    /// Start the rotation at a random position so that many balancers
    /// sharing a list don't all hit the first endpoint.
    pub fn new() -> Self {
        Self::starting_at(fastrand::usize(..0xffff))
    }

    /// Start the rotation right before `counter`.
    pub fn starting_at(counter: usize) -> Self {
        Self {
            state: Mutex::new(RotationState {
                endpoints: Vec::new(),
                counter,
            }),
        }
    }

    pub fn endpoints(&self) -> Vec<E> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .endpoints
            .clone()
    }
}

impl<E: Endpoint> Default for RoundRobin<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Endpoint, Er: Send + 'static> SelectionPolicy<E, Er> for RoundRobin<E> {
    fn name(&self) -> &'static str {
        "round_robin"
    }

    fn next(&self) -> Option<Selection<E>> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.endpoints.is_empty() {
            return None;
        }

        // Modulo keeps the counter in range when the list shrank since the last call.
        let len = state.endpoints.len();
        state.counter = (state.counter % len + 1) % len;
        Some(Selection::new(state.endpoints[state.counter].clone(), false))
    }

    fn good(&self, _endpoint: &E, _started: Instant, _finished: Instant) {}

    fn bad(&self, _endpoint: &E, _started: Instant, _finished: Instant) {}

    fn set_endpoints(&self, endpoints: &[E]) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.endpoints = dedup(endpoints);
    }
}
