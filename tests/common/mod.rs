//! Shared utilities for integration testing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;

use endpoint_balancer::{AttemptError, ResolveError, Resolver};

/// Records which endpoints a request callback was called with.
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<String>>>,
}

#[allow(dead_code)]
impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, endpoint: impl ToString) {
        self.calls.lock().unwrap().push(endpoint.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

/// A retryable failure.
#[allow(dead_code)]
pub fn unavailable() -> AttemptError {
    AttemptError::http(503, "Service Unavailable")
}

/// Resolver that counts its calls and tags every address with the call number,
/// so `svc:80` resolves to `svc:80#1`, then `svc:80#2`, ...
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct CountingResolver {
    calls: Arc<AtomicUsize>,
    fail_after: Option<usize>,
    empty_after: Option<usize>,
}

#[allow(dead_code)]
impl CountingResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call after the first `n` fails.
    pub fn failing_after(n: usize) -> Self {
        Self {
            fail_after: Some(n),
            ..Self::default()
        }
    }

    /// Every call after the first `n` succeeds with no addresses.
    pub fn empty_after(n: usize) -> Self {
        Self {
            empty_after: Some(n),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Resolver<String> for CountingResolver {
    fn resolve<'a>(&'a self, endpoints: &'a [String]) -> BoxFuture<'a, Result<Vec<String>, ResolveError>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let failing = self.fail_after.is_some_and(|n| call > n);
        let empty = self.empty_after.is_some_and(|n| call > n);
        Box::pin(async move {
            if failing {
                return Err(ResolveError::Lookup {
                    endpoint: endpoints.join(","),
                    attempts: 1,
                    message: "scripted failure".to_string(),
                });
            }
            if empty {
                return Ok(Vec::new());
            }
            Ok(endpoints.iter().map(|e| format!("{e}#{call}")).collect())
        })
    }
}
