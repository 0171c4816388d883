//! Error budget for the status-check escalation path.
//!
//! Only failed `status` calls count. Any successful status check resets the
//! count; once the count reaches the threshold the budget is exhausted and
//! the poll loop faults.

/// Consecutive-failure counter with a fixed threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorBudget {
    consecutive_failures: u32,
    threshold: u32,
}

impl ErrorBudget {
    pub fn new(threshold: u32) -> Self {
        Self {
            consecutive_failures: 0,
            threshold: threshold.max(1),
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Count one failure. Returns `true` if the budget is now exhausted.
    pub fn record_failure(&mut self) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.is_exhausted()
    }

    pub fn is_exhausted(&self) -> bool {
        self.consecutive_failures >= self.threshold
    }
}
