//! Deadline enforcement.
//!
//! # Responsibilities
//! - Bound probes and attempts by the request deadline
//! - Tell the retry loop when the deadline has passed

use std::future::Future;

use tokio::time::{error::Elapsed, timeout_at, Instant};

/// Run `fut` to completion, or until `deadline` if there is one.
pub async fn within<F: Future>(deadline: Option<Instant>, fut: F) -> Result<F::Output, Elapsed> {
    match deadline {
        Some(deadline) => timeout_at(deadline, fut).await,
        None => Ok(fut.await),
    }
}

pub fn expired(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}
