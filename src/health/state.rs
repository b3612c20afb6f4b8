//! Endpoint health state machine.
//!
//! # States
//! - green (level 0): healthy
//! - yellow-N (1..yellow_states): degraded but still selectable
//! - red (level == yellow_states): excluded from selection
//!
//! # State Transitions
//! ```text
//! improve: level - 1, floored at green
//! worsen:  level + 1, capped at red
//! sweep:   untouched for > reset_time → one improve step
//! ```

use std::time::Duration;

use tokio::time::Instant;

/// Default number of steps between green and red.
pub const DEFAULT_YELLOW_STATES: u32 = 4;

/// Default passive recovery interval.
pub const DEFAULT_RESET_TIME: Duration = Duration::from_secs(60);

/// Label reported for an endpoint whose policy tracks no health.
pub const UNTRACKED_LABEL: &str = "n/a";

/// Human readable label for a health level.
pub fn level_label(level: u32, yellow_states: u32) -> String {
    if level == 0 {
        "green".to_string()
    } else if level >= yellow_states {
        "red".to_string()
    } else {
        format!("yellow-{}", level)
    }
}

/// Health record of one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointRecord<E> {
    pub endpoint: E,
    pub level: u32,
    /// `None` until the first transition; such records are always stale.
    pub last_transition: Option<Instant>,
}

impl<E> EndpointRecord<E> {
    pub fn new(endpoint: E, level: u32) -> Self {
        Self {
            endpoint,
            level,
            last_transition: None,
        }
    }

    /// Whether the record went untouched for longer than `reset_time`.
    pub fn is_stale(&self, now: Instant, reset_time: Duration) -> bool {
        match self.last_transition {
            None => true,
            Some(at) => now.saturating_duration_since(at) > reset_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        assert_eq!(level_label(0, 4), "green");
        assert_eq!(level_label(1, 4), "yellow-1");
        assert_eq!(level_label(3, 4), "yellow-3");
        assert_eq!(level_label(4, 4), "red");
        assert_eq!(level_label(1, 1), "red");
    }

    #[test]
    fn test_staleness() {
        let now = Instant::now();
        let mut record = EndpointRecord::new("a", 2);
        assert!(record.is_stale(now, DEFAULT_RESET_TIME));

        record.last_transition = Some(now);
        assert!(!record.is_stale(now + Duration::from_secs(60), DEFAULT_RESET_TIME));
        assert!(record.is_stale(now + Duration::from_secs(61), DEFAULT_RESET_TIME));
    }
}
