//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Balancer, policies, tracker and resolver produce:
//!     → logging.rs (structured tracing events, request_id span per request)
//!     → metrics.rs (attempt counters, health gauges)
//!
//! Consumers:
//!     → stdout via tracing-subscriber (binary)
//!     → Prometheus scrape endpoint (binary, optional)
//! ```
//!
//! # Design Decisions
//! - The library only emits; installing subscribers and recorders is the binary's job
//! - Health transitions are logged at debug, overall changes at info

pub mod logging;
pub mod metrics;
