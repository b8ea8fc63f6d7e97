//! Stop conditions consulted before each new unit of work.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::time::Instant;

/// Counts consecutive non-success outcomes in completion order.
///
/// Shared by every in-flight unit; a success anywhere resets the run.
#[derive(Debug)]
pub(crate) struct CircuitBreaker {
    consecutive_failures: AtomicU32,
    threshold: u32,
}

impl CircuitBreaker {
    pub(crate) fn new(threshold: u32) -> Self {
        Self {
            consecutive_failures: AtomicU32::new(0),
            threshold,
        }
    }

    pub(crate) fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
    }

    pub(crate) fn record_failure(&self) {
        // Stays at u32::MAX instead of wrapping; `checked_add` refuses the update there.
        self.consecutive_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_add(1))
            .ok();
    }

    pub(crate) fn record(&self, success: bool) {
        if success {
            self.record_success();
        } else {
            self.record_failure();
        }
    }

    pub(crate) fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }

    pub(crate) fn should_stop(&self) -> bool {
        self.consecutive_failures() >= self.threshold
    }
}

/// Wall-clock budget for one run, fixed at construction.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TimeGovernor {
    deadline: Option<Instant>,
}

impl TimeGovernor {
    /// `None` means unbounded.
    pub(crate) fn start(budget: Option<Duration>) -> Self {
        Self {
            deadline: budget.map(|b| Instant::now() + b),
        }
    }

    /// Time left before the deadline; `None` when unbounded.
    pub(crate) fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub(crate) fn expired(&self) -> bool {
        self.remaining().is_some_and(|left| left.is_zero())
    }
}
