//! Endpoint discovery subsystem.
//!
//! # Data Flow
//! ```text
//! Configured endpoints (hostnames, URLs)
//!     → Resolver::resolve()
//!         - dns.rs (system resolver, bounded retries)
//!     → resolved addresses
//!     → SelectionPolicy::set_endpoints()
//! ```
//!
//! # Design Decisions
//! - Resolution is a black box behind a trait so tests can count calls
//! - The balancer decides when to resolve; resolvers only resolve

pub mod dns;

use futures_util::future::BoxFuture;
use thiserror::Error;

pub use dns::{DnsResolver, DEFAULT_RESOLVE_ATTEMPTS};

/// Errors that can occur while resolving endpoints.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// The endpoint has no host or port to look up.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Every lookup attempt failed.
    #[error("lookup of {endpoint} failed after {attempts} attempts: {message}")]
    Lookup {
        endpoint: String,
        attempts: u32,
        message: String,
    },

    /// Resolution succeeded but produced nothing to talk to.
    #[error("resolution produced no addresses")]
    NoAddresses,
}

/// Expands configured endpoints into the addresses requests go to.
pub trait Resolver<E>: Send + Sync {
    fn resolve<'a>(&'a self, endpoints: &'a [E]) -> BoxFuture<'a, Result<Vec<E>, ResolveError>>;
}
