//! Error classification.
//!
//! # Responsibilities
//! - Give every request/probe error a coarse category
//! - Expose an HTTP-like status code when the error carries one
//! - Provide a ready-made error type for callers without their own

use std::io;

use thiserror::Error;

/// Coarse kind of failure an attempt can end with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Out of memory, stack exhaustion, process exit.
    Resource,
    Argument,
    Type,
    Name,
    Index,
    Range,
    Lookup,
    Arithmetic,
    Timeout,
    Network,
    Io,
    Http,
    Other,
}

/// What the fatal classifier needs to know about an error.
pub trait Classify {
    fn category(&self) -> ErrorCategory;

    /// HTTP-like status code, if the error carries one.
    fn status_code(&self) -> Option<u16> {
        None
    }
}

/// Short label used in exhaustion summaries, e.g. `Timeout` or `Http 503`.
pub fn failure_label<Er: Classify + ?Sized>(err: &Er) -> String {
    match err.status_code() {
        Some(status) => format!("{:?} {}", err.category(), status),
        None => format!("{:?}", err.category()),
    }
}

impl Classify for io::Error {
    fn category(&self) -> ErrorCategory {
        match self.kind() {
            io::ErrorKind::OutOfMemory => ErrorCategory::Resource,
            io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => ErrorCategory::Argument,
            io::ErrorKind::TimedOut => ErrorCategory::Timeout,
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::AddrInUse
            | io::ErrorKind::AddrNotAvailable
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => ErrorCategory::Network,
            _ => ErrorCategory::Io,
        }
    }
}

impl Classify for reqwest::Error {
    fn category(&self) -> ErrorCategory {
        if self.is_builder() {
            ErrorCategory::Argument
        } else if self.is_timeout() {
            ErrorCategory::Timeout
        } else if self.status().is_some() {
            ErrorCategory::Http
        } else if self.is_connect() || self.is_request() {
            ErrorCategory::Network
        } else if self.is_decode() {
            ErrorCategory::Type
        } else {
            ErrorCategory::Other
        }
    }

    fn status_code(&self) -> Option<u16> {
        self.status().map(|s| s.as_u16())
    }
}

/// General purpose attempt error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AttemptError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{category:?} error: {message}")]
    Other { category: ErrorCategory, message: String },
}

impl AttemptError {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    pub fn other(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self::Other {
            category,
            message: message.into(),
        }
    }
}

impl Classify for AttemptError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::Http { .. } => ErrorCategory::Http,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Connection(_) => ErrorCategory::Network,
            Self::InvalidArgument(_) => ErrorCategory::Argument,
            Self::Other { category, .. } => *category,
        }
    }

    fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<io::Error> for AttemptError {
    fn from(err: io::Error) -> Self {
        match err.category() {
            ErrorCategory::Timeout => Self::Timeout(err.to_string()),
            ErrorCategory::Network => Self::Connection(err.to_string()),
            ErrorCategory::Argument => Self::InvalidArgument(err.to_string()),
            category => Self::other(category, err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_categories() {
        let err = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        assert_eq!(err.category(), ErrorCategory::Network);

        let err = io::Error::new(io::ErrorKind::InvalidInput, "bad");
        assert_eq!(err.category(), ErrorCategory::Argument);

        let err = io::Error::new(io::ErrorKind::TimedOut, "slow");
        assert_eq!(err.category(), ErrorCategory::Timeout);
        assert_eq!(err.status_code(), None);
    }

    #[test]
    fn test_labels() {
        assert_eq!(failure_label(&AttemptError::http(503, "down")), "Http 503");
        assert_eq!(failure_label(&AttemptError::Timeout("x".into())), "Timeout");
    }

    #[test]
    fn test_from_io_error() {
        let err: AttemptError = io::Error::new(io::ErrorKind::ConnectionReset, "reset").into();
        assert!(matches!(err, AttemptError::Connection(_)));
        assert_eq!(err.category(), ErrorCategory::Network);
    }
}
