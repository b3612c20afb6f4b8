//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Attempt failed:
//!     → classify.rs (category + optional status code)
//!     → fatal.rs (stop now, or move on?)
//!     → retries.rs (budget left for another attempt?)
//! Every attempt and probe:
//!     → timeouts.rs (bounded by the request deadline, if any)
//! ```
//!
//! # Design Decisions
//! - Classification is a pure function of the error value
//! - Fatal errors surface unchanged; retryable ones are recorded
//! - No backoff between attempts: the next attempt goes to another endpoint

pub mod classify;
pub mod fatal;
pub mod retries;
pub mod timeouts;

pub use classify::{failure_label, AttemptError, Classify, ErrorCategory};
pub use fatal::{is_fatal_by_default, FatalPolicy, DEFAULT_FATAL_CATEGORIES};
pub use retries::RetryPolicy;
