//! Fatal error classification.
//!
//! # Responsibilities
//! - Decide whether a failed attempt stops the whole request
//! - Allow the decision to be replaced by a predicate or a category list
//!
//! # Design Decisions
//! - Programming errors are never retried
//! - 4xx statuses are the caller's fault and fatal, except 408 Request Timeout
//! - Everything else moves on to the next endpoint

use std::fmt;
use std::sync::Arc;

use crate::resilience::classify::{Classify, ErrorCategory};

/// Categories that are fatal under the default policy.
pub const DEFAULT_FATAL_CATEGORIES: &[ErrorCategory] = &[
    ErrorCategory::Resource,
    ErrorCategory::Argument,
    ErrorCategory::Type,
    ErrorCategory::Name,
    ErrorCategory::Index,
    ErrorCategory::Range,
    ErrorCategory::Lookup,
    ErrorCategory::Arithmetic,
];

const REQUEST_TIMEOUT: u16 = 408;

/// Default classification.
pub fn is_fatal_by_default<Er: Classify + ?Sized>(err: &Er) -> bool {
    if DEFAULT_FATAL_CATEGORIES.contains(&err.category()) {
        return true;
    }
    match err.status_code() {
        Some(status) => (400..500).contains(&status) && status != REQUEST_TIMEOUT,
        None => false,
    }
}

/// Decides whether an error is fatal (stop) or retryable (next endpoint).
pub enum FatalPolicy<Er> {
    Default,
    /// Only this category is fatal.
    Category(ErrorCategory),
    /// Only these categories are fatal.
    Categories(Vec<ErrorCategory>),
    Predicate(Arc<dyn Fn(&Er) -> bool + Send + Sync>),
}

impl<Er: Classify> FatalPolicy<Er> {
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Er) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(f))
    }

    pub fn is_fatal(&self, err: &Er) -> bool {
        match self {
            Self::Default => is_fatal_by_default(err),
            Self::Category(category) => err.category() == *category,
            Self::Categories(categories) => categories.contains(&err.category()),
            Self::Predicate(f) => f(err),
        }
    }
}

impl<Er> Default for FatalPolicy<Er> {
    fn default() -> Self {
        Self::Default
    }
}

impl<Er> Clone for FatalPolicy<Er> {
    fn clone(&self) -> Self {
        match self {
            Self::Default => Self::Default,
            Self::Category(c) => Self::Category(*c),
            Self::Categories(cs) => Self::Categories(cs.clone()),
            Self::Predicate(f) => Self::Predicate(f.clone()),
        }
    }
}

impl<Er> fmt::Debug for FatalPolicy<Er> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "Default"),
            Self::Category(c) => f.debug_tuple("Category").field(c).finish(),
            Self::Categories(cs) => f.debug_tuple("Categories").field(cs).finish(),
            Self::Predicate(_) => write!(f, "Predicate(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::classify::AttemptError;

    #[test]
    fn test_programming_errors_are_fatal() {
        assert!(is_fatal_by_default(&AttemptError::InvalidArgument("x".into())));
        assert!(is_fatal_by_default(&AttemptError::other(ErrorCategory::Resource, "oom")));
        assert!(is_fatal_by_default(&AttemptError::other(ErrorCategory::Index, "oob")));
    }

    #[test]
    fn test_client_errors_are_fatal_except_timeout() {
        assert!(is_fatal_by_default(&AttemptError::http(400, "bad request")));
        assert!(is_fatal_by_default(&AttemptError::http(404, "not found")));
        assert!(is_fatal_by_default(&AttemptError::http(499, "closed")));
        assert!(!is_fatal_by_default(&AttemptError::http(408, "timeout")));
        assert!(!is_fatal_by_default(&AttemptError::http(500, "oops")));
        assert!(!is_fatal_by_default(&AttemptError::http(503, "down")));
    }

    #[test]
    fn test_transport_errors_are_retryable() {
        assert!(!is_fatal_by_default(&AttemptError::Connection("refused".into())));
        assert!(!is_fatal_by_default(&AttemptError::Timeout("slow".into())));
    }

    #[test]
    fn test_overrides() {
        let timeout = AttemptError::Timeout("slow".into());
        let not_found = AttemptError::http(404, "nope");

        let policy = FatalPolicy::Category(ErrorCategory::Timeout);
        assert!(policy.is_fatal(&timeout));
        assert!(!policy.is_fatal(&not_found));

        let policy = FatalPolicy::Categories(vec![ErrorCategory::Timeout, ErrorCategory::Http]);
        assert!(policy.is_fatal(&timeout));
        assert!(policy.is_fatal(&not_found));

        let policy = FatalPolicy::predicate(|_: &AttemptError| false);
        assert!(!policy.is_fatal(&AttemptError::InvalidArgument("x".into())));
    }
}
