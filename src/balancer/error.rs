//! Terminal errors of a balanced request.

use std::fmt;

use thiserror::Error;

use crate::config::ConfigError;
use crate::discovery::ResolveError;
use crate::resilience::{failure_label, Classify};

/// Every retryable failure of one request, grouped by endpoint in the
/// order endpoints first failed.
pub type FailureHistory<E, Er> = Vec<(E, Vec<Er>)>;

/// Append `err` to the history of `endpoint`.
pub(crate) fn record_failure<E: PartialEq, Er>(history: &mut FailureHistory<E, Er>, endpoint: E, err: Er) {
    match history.iter_mut().find(|(ep, _)| *ep == endpoint) {
        Some((_, errors)) => errors.push(err),
        None => history.push((endpoint, vec![err])),
    }
}

/// Every attempt failed with a retryable error, or no endpoint was usable.
#[derive(Error)]
#[error("{message}")]
pub struct NoResultError<E, Er> {
    message: String,
    attempts: usize,
    details: FailureHistory<E, Er>,
}

impl<E: fmt::Display, Er: Classify> NoResultError<E, Er> {
    pub fn new(attempts: usize, details: FailureHistory<E, Er>) -> Self {
        let summary: Vec<String> = details
            .iter()
            .map(|(endpoint, errors)| {
                let mut labels: Vec<String> = Vec::new();
                for label in errors.iter().map(failure_label) {
                    if !labels.contains(&label) {
                        labels.push(label);
                    }
                }
                format!("'{}' => [{}]", endpoint, labels.join(", "))
            })
            .collect();
        let message = format!(
            "Request failed after {} tries to {} endpoints: ({})",
            attempts,
            details.len(),
            summary.join(", ")
        );
        Self {
            message,
            attempts,
            details,
        }
    }
}

impl<E, Er> NoResultError<E, Er> {
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    pub fn endpoint_count(&self) -> usize {
        self.details.len()
    }

    /// Failures per endpoint, every attempt included.
    pub fn details(&self) -> &FailureHistory<E, Er> {
        &self.details
    }

    /// Failures recorded for `endpoint`.
    pub fn failures_for(&self, endpoint: &E) -> &[Er]
    where
        E: PartialEq,
    {
        self.details
            .iter()
            .find(|(ep, _)| ep == endpoint)
            .map(|(_, errors)| errors.as_slice())
            .unwrap_or(&[])
    }
}

impl<E: fmt::Debug, Er: fmt::Debug> fmt::Debug for NoResultError<E, Er> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoResultError")
            .field("message", &self.message)
            .field("details", &self.details)
            .finish()
    }
}

/// Why a balanced request produced no value.
#[derive(Debug, Error)]
pub enum BalancerError<E, Er> {
    /// A fatal error from a request or probe, passed through unchanged.
    #[error("fatal error from {endpoint}: {source}")]
    Fatal { endpoint: E, source: Er },

    #[error(transparent)]
    NoResult(#[from] NoResultError<E, Er>),

    /// The request deadline passed before any attempt succeeded.
    #[error("deadline exceeded after {attempts} attempts")]
    DeadlineExceeded {
        attempts: usize,
        details: FailureHistory<E, Er>,
    },

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl<E, Er> BalancerError<E, Er> {
    /// The original error, if this was a fatal failure.
    pub fn into_source(self) -> Option<Er> {
        match self {
            Self::Fatal { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::AttemptError;

    #[test]
    fn test_summary_message() {
        let mut history = Vec::new();
        record_failure(&mut history, "a", AttemptError::Timeout("1".into()));
        record_failure(&mut history, "b", AttemptError::http(503, "down"));
        record_failure(&mut history, "a", AttemptError::Timeout("2".into()));
        record_failure(&mut history, "a", AttemptError::Connection("3".into()));

        let err = NoResultError::new(4, history);
        assert_eq!(
            err.to_string(),
            "Request failed after 4 tries to 2 endpoints: ('a' => [Timeout, Network], 'b' => [Http 503])"
        );
        assert_eq!(err.failures_for(&"a").len(), 3);
        assert_eq!(err.failures_for(&"c").len(), 0);
        assert_eq!(err.attempts(), 4);
        assert_eq!(err.endpoint_count(), 2);
    }

    #[test]
    fn test_into_fatal() {
        let err: BalancerError<&str, AttemptError> = BalancerError::Fatal {
            endpoint: "a",
            source: AttemptError::http(404, "missing"),
        };
        assert!(err.is_fatal());
        assert_eq!(err.into_source(), Some(AttemptError::http(404, "missing")));
    }
}
