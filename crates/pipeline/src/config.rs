//! Scheduler tuning parameters.

use std::time::Duration;

use crate::error::SchedulerError;

/// Default number of jobs kept in flight at once.
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 3;

/// Default delay between polling passes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Default upper bound on how long `stop` waits for the current cycle.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Configuration for a [`Scheduler`](crate::Scheduler).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Maximum number of jobs in flight. Must be at least 1.
    pub concurrency_limit: usize,
    /// Delay between the end of one cycle and the start of the next.
    pub poll_interval: Duration,
    /// Fail a job after this many consecutive still-processing polls.
    /// `None` polls forever.
    pub max_processing_polls: Option<u32>,
    /// How long [`Scheduler::stop`](crate::Scheduler::stop) waits for the
    /// loop to finish its current cycle.
    pub stop_timeout: Duration,
    /// Run an admission pass inside `enqueue` when the loop is not running.
    pub admit_on_enqueue: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_processing_polls: None,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            admit_on_enqueue: true,
        }
    }
}

impl SchedulerConfig {
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_processing_polls(mut self, max: Option<u32>) -> Self {
        self.max_processing_polls = max;
        self
    }

    pub fn with_admit_on_enqueue(mut self, admit: bool) -> Self {
        self.admit_on_enqueue = admit;
        self
    }

    /// Reject zero limits and intervals.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.concurrency_limit == 0 {
            return Err(SchedulerError::InvalidConfig(
                "concurrency_limit must be at least 1".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(SchedulerError::InvalidConfig(
                "poll_interval must be positive".to_string(),
            ));
        }
        if self.max_processing_polls == Some(0) {
            return Err(SchedulerError::InvalidConfig(
                "max_processing_polls must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}
