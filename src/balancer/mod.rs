//! Request orchestration subsystem.
//!
//! # Data Flow
//! ```text
//! request(f)
//!     → refresh resolution if the addresses are stale
//!     → loop:
//!         retry gate (skipped before the first attempt)
//!         → deadline check
//!         → SelectionPolicy::next()
//!         → optional probe
//!         → f(endpoint)
//!             ok        → good(), return value
//!             fatal     → on_exception, return the error unchanged
//!             retryable → on_exception, bad(), record, next endpoint
//!     → NoResultError with every recorded failure
//! ```
//!
//! # Design Decisions
//! - Only fatal errors and exhaustion leave the loop
//! - Fatal errors never touch endpoint health
//! - A probe that fails with a fatal error ends the request like a real attempt would

pub mod error;
pub mod options;
pub mod request;

pub use error::{BalancerError, FailureHistory, NoResultError};
pub use options::{BalancerOptions, ExceptionHook, PolicySpec};
pub use request::RequestBalancer;
