//! Health tracking for a dynamic set of endpoints.
//!
//! # Responsibilities
//! - Own one [`EndpointRecord`] per endpoint, in registration order
//! - Apply improve/worsen transitions
//! - Passively recover endpoints nobody touched for `reset_time`
//! - Notify on changes of the overall (best) health level

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

use crate::health::state::{level_label, EndpointRecord, DEFAULT_RESET_TIME, DEFAULT_YELLOW_STATES};
use crate::load_balancer::Endpoint;
use crate::observability::metrics;

/// Called with the new overall label (`"green"`, `"yellow-N"`, `"red"`).
pub type HealthChangeHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Errors raised by the tracker.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HealthError {
    /// Transition requested for an endpoint that was never registered.
    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(String),
}

/// Tuning knobs shared by the tracker and the health-check policy.
#[derive(Clone)]
pub struct HealthSettings {
    /// Level at which an endpoint is red.
    pub yellow_states: u32,
    /// Idle time after which an endpoint recovers one level.
    pub reset_time: Duration,
    pub on_health_change: Option<HealthChangeHook>,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            yellow_states: DEFAULT_YELLOW_STATES,
            reset_time: DEFAULT_RESET_TIME,
            on_health_change: None,
        }
    }
}

impl fmt::Debug for HealthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthSettings")
            .field("yellow_states", &self.yellow_states)
            .field("reset_time", &self.reset_time)
            .field("on_health_change", &self.on_health_change.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Improve,
    Worsen,
}

struct TrackerState<E> {
    records: Vec<EndpointRecord<E>>,
    min_level_seen: u32,
}

/// Health state of every known endpoint.
pub struct HealthTracker<E> {
    state: Mutex<TrackerState<E>>,
    settings: HealthSettings,
}

impl<E: Endpoint> HealthTracker<E> {
    /// Track `endpoints`, all starting green.
    pub fn new(endpoints: &[E], settings: HealthSettings) -> Self {
        let mut records: Vec<EndpointRecord<E>> = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            if !records.iter().any(|r| r.endpoint == *endpoint) {
                records.push(EndpointRecord::new(endpoint.clone(), 0));
            }
        }
        Self {
            state: Mutex::new(TrackerState {
                records,
                min_level_seen: 0,
            }),
            settings,
        }
    }

    /// Forget everything and track `endpoints`, all green.
    pub fn reset(&self, endpoints: &[E]) {
        let mut state = self.lock();
        state.records.clear();
        for endpoint in endpoints {
            if !state.records.iter().any(|r| r.endpoint == *endpoint) {
                state.records.push(EndpointRecord::new(endpoint.clone(), 0));
            }
        }
        state.min_level_seen = 0;
    }

    /// Replace the tracked set.
    ///
    /// Survivors keep their record and unseen endpoints start at yellow-1 with
    /// no transition time. Dropped endpoints are forgotten. The overall health
    /// hook fires right away when the new set changes the best level.
    pub fn register(&self, endpoints: &[E]) {
        let mut state = self.lock();
        let initial = 1.min(self.settings.yellow_states);

        let mut records: Vec<EndpointRecord<E>> = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            if records.iter().any(|r| r.endpoint == *endpoint) {
                continue;
            }
            let record = match state.records.iter().position(|r| r.endpoint == *endpoint) {
                Some(index) => state.records.swap_remove(index),
                None => {
                    tracing::debug!(endpoint = %endpoint, "Registering endpoint");
                    EndpointRecord::new(endpoint.clone(), initial)
                }
            };
            records.push(record);
        }
        for dropped in &state.records {
            tracing::debug!(endpoint = %dropped.endpoint, "Forgetting endpoint");
        }
        state.records = records;
        self.notify_overall(&mut state);
    }

    /// Improve every endpoint idle for longer than `reset_time` by one level.
    pub fn sweep(&self) {
        self.sweep_at(Instant::now());
    }

    pub fn sweep_at(&self, now: Instant) {
        let mut state = self.lock();
        let reset_time = self.settings.reset_time;
        let stale: Vec<usize> = state
            .records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_stale(now, reset_time))
            .map(|(i, _)| i)
            .collect();
        for index in stale {
            self.apply(&mut state, index, Step::Improve, now);
        }
    }

    /// Sweep, then list every endpoint that is not red with its level.
    pub fn usable_endpoints(&self) -> Vec<(E, u32)> {
        self.usable_endpoints_at(Instant::now())
    }

    pub fn usable_endpoints_at(&self, now: Instant) -> Vec<(E, u32)> {
        self.sweep_at(now);
        self.lock()
            .records
            .iter()
            .filter(|r| r.level < self.settings.yellow_states)
            .map(|r| (r.endpoint.clone(), r.level))
            .collect()
    }

    /// Move `endpoint` one level toward green. Returns the new level.
    pub fn improve(&self, endpoint: &E, at: Instant) -> Result<u32, HealthError> {
        self.transition(endpoint, Step::Improve, at)
    }

    /// Move `endpoint` one level toward red. Returns the new level.
    pub fn worsen(&self, endpoint: &E, at: Instant) -> Result<u32, HealthError> {
        self.transition(endpoint, Step::Worsen, at)
    }

    pub fn level(&self, endpoint: &E) -> Option<u32> {
        self.lock()
            .records
            .iter()
            .find(|r| r.endpoint == *endpoint)
            .map(|r| r.level)
    }

    pub fn endpoints(&self) -> Vec<E> {
        self.lock().records.iter().map(|r| r.endpoint.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    /// Endpoint → `"green"` / `"yellow-N"` / `"red"`.
    pub fn stats(&self) -> HashMap<E, String> {
        self.lock()
            .records
            .iter()
            .map(|r| (r.endpoint.clone(), level_label(r.level, self.settings.yellow_states)))
            .collect()
    }

    fn transition(&self, endpoint: &E, step: Step, at: Instant) -> Result<u32, HealthError> {
        let mut state = self.lock();
        let index = state
            .records
            .iter()
            .position(|r| r.endpoint == *endpoint)
            .ok_or_else(|| HealthError::UnknownEndpoint(endpoint.to_string()))?;
        Ok(self.apply(&mut state, index, step, at))
    }

    /// The overall health hook runs with the state lock held and must not call back
    /// into this tracker.
    fn apply(&self, state: &mut TrackerState<E>, index: usize, step: Step, at: Instant) -> u32 {
        let yellow_states = self.settings.yellow_states;
        let record = &mut state.records[index];
        let before = record.level;
        record.level = match step {
            Step::Improve => before.saturating_sub(1),
            Step::Worsen => (before + 1).min(yellow_states),
        };
        record.last_transition = Some(at);
        let level = record.level;

        if level != before {
            tracing::debug!(
                endpoint = %record.endpoint,
                from = %level_label(before, yellow_states),
                to = %level_label(level, yellow_states),
                "Endpoint health changed"
            );
            metrics::record_endpoint_level(&record.endpoint.to_string(), level);
        }

        self.notify_overall(state);
        level
    }

    /// Fire the overall health hook when the best level moved.
    fn notify_overall(&self, state: &mut TrackerState<E>) {
        let current_min = state.records.iter().map(|r| r.level).min().unwrap_or(0);
        if current_min == state.min_level_seen {
            return;
        }
        let label = level_label(current_min, self.settings.yellow_states);
        tracing::info!(overall = %label, "Overall endpoint health changed");
        metrics::record_overall_health(current_min);
        if let Some(hook) = &self.settings.on_health_change {
            hook(&label);
        }
        state.min_level_seen = current_min;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TrackerState<E>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<E: Endpoint> fmt::Debug for HealthTracker<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthTracker")
            .field("records", &self.lock().records)
            .field("settings", &self.settings)
            .finish()
    }
}
