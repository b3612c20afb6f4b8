//! Endpoint health subsystem.
//!
//! # Data Flow
//! ```text
//! Request outcome observed (policy good/bad)
//!     → tracker.rs improve()/worsen()
//!     → state.rs level moves one step
//!     → overall (best) level recomputed
//!     → on_health_change fires if the best level changed
//!
//! Selection:
//!     tracker.rs usable_endpoints()
//!     → sweep stale records one step toward green
//!     → every endpoint that is not red
//! ```
//!
//! # Design Decisions
//! - Multi-level states (green, yellow-N, red) instead of a healthy/unhealthy flag
//! - Recovery is passive: idle endpoints drift back one level per reset_time
//! - Overall health notification is level-triggered and debounced

pub mod state;
pub mod tracker;

pub use state::{level_label, EndpointRecord, DEFAULT_RESET_TIME, DEFAULT_YELLOW_STATES, UNTRACKED_LABEL};
pub use tracker::{HealthChangeHook, HealthError, HealthSettings, HealthTracker};
