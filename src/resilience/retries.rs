//! Retry gating.
//!
//! # Responsibilities
//! - Decide, before each attempt after the first, whether to keep going
//!
//! # Design Decisions
//! - The first attempt is never gated
//! - Default budget is one attempt per endpoint
//! - `Enabled(true)` keeps going until the policy runs out of endpoints or
//!   the deadline passes

use std::fmt;
use std::sync::Arc;

/// Retry budget of a single balanced request.
pub enum RetryPolicy<E> {
    /// Try every endpoint once.
    EachEndpoint,
    /// Stop after this many attempts.
    Attempts(usize),
    /// `false`: first attempt only. `true`: no cap.
    ///
    /// With `true`, policies that never run out of endpoints (round-robin,
    /// sticky) keep retrying a retryable error until success, a fatal error
    /// or the deadline. Pair it with
    /// [`BalancerOptions::request_timeout`](crate::BalancerOptions::request_timeout)
    /// or [`RequestBalancer::request_with_deadline`](crate::RequestBalancer::request_with_deadline).
    Enabled(bool),
    /// Called with the active endpoint list and the attempts made so far.
    Custom(Arc<dyn Fn(&[E], usize) -> bool + Send + Sync>),
}

impl<E> RetryPolicy<E> {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&[E], usize) -> bool + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    /// Whether another attempt may start after `attempts` attempts.
    pub fn should_retry(&self, endpoints: &[E], attempts: usize) -> bool {
        if attempts == 0 {
            return true;
        }
        match self {
            Self::EachEndpoint => attempts < endpoints.len(),
            Self::Attempts(cap) => attempts < *cap,
            Self::Enabled(enabled) => *enabled,
            Self::Custom(f) => f(endpoints, attempts),
        }
    }
}

impl<E> Default for RetryPolicy<E> {
    fn default() -> Self {
        Self::EachEndpoint
    }
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        match self {
            Self::EachEndpoint => Self::EachEndpoint,
            Self::Attempts(n) => Self::Attempts(*n),
            Self::Enabled(b) => Self::Enabled(*b),
            Self::Custom(f) => Self::Custom(f.clone()),
        }
    }
}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EachEndpoint => write!(f, "EachEndpoint"),
            Self::Attempts(n) => f.debug_tuple("Attempts").field(n).finish(),
            Self::Enabled(b) => f.debug_tuple("Enabled").field(b).finish(),
            Self::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_endpoint() {
        let retry = RetryPolicy::EachEndpoint;
        let endpoints = [1, 2, 3];
        assert!(retry.should_retry(&endpoints, 0));
        assert!(retry.should_retry(&endpoints, 2));
        assert!(!retry.should_retry(&endpoints, 3));
    }

    #[test]
    fn test_attempt_cap() {
        let retry = RetryPolicy::Attempts(5);
        assert!(retry.should_retry(&[1], 4));
        assert!(!retry.should_retry(&[1], 5));

        // The first attempt always happens.
        assert!(RetryPolicy::Attempts(0).should_retry(&[1], 0));
        assert!(!RetryPolicy::Attempts(0).should_retry(&[1], 1));
    }

    #[test]
    fn test_enabled_flag() {
        assert!(!RetryPolicy::Enabled(false).should_retry(&[1, 2], 1));
        assert!(RetryPolicy::Enabled(true).should_retry(&[1, 2], 100));
    }

    #[test]
    fn test_custom() {
        let retry = RetryPolicy::custom(|endpoints: &[u32], n| n < endpoints.len() * 2);
        assert!(retry.should_retry(&[1, 2], 3));
        assert!(!retry.should_retry(&[1, 2], 4));
    }
}
