//! Progress statistics and ETA estimation for a job batch.
//!
//! Everything here is derived from the scheduler's job collections; nothing
//! is stored between calls. The mean duration is a plain arithmetic mean of
//! completed jobs, so early estimates drift but stay reproducible.

use serde::{Deserialize, Serialize};

use crate::job::Job;
use crate::types::Timestamp;

/// Seconds per minute (60.0).
pub const SECS_PER_MINUTE: f64 = 60.0;
/// Seconds per hour (3600.0).
pub const SECS_PER_HOUR: f64 = 3600.0;

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Point-in-time statistics for one scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub pending: usize,
    pub in_flight: usize,
    pub completed: usize,
    pub failed: usize,
    /// `completed / (completed + failed)`, 0.0 when nothing has terminated.
    pub success_rate: f64,
    /// Mean seconds from admission to completion over completed jobs.
    pub mean_duration_secs: Option<f64>,
    /// Projected seconds until pending and in-flight are both drained.
    pub eta_secs: Option<f64>,
}

impl ProgressSnapshot {
    /// Share of all jobs that reached a terminal state, in percent.
    pub fn progress_percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.completed + self.failed) as f64 / self.total as f64 * 100.0
    }
}

// ---------------------------------------------------------------------------
// Estimation logic
// ---------------------------------------------------------------------------

/// Compute a [`ProgressSnapshot`] from the scheduler's collections.
///
/// `now` is passed in rather than read from the clock so results are
/// deterministic for a given state.
pub fn estimate<'a, I>(
    pending: usize,
    in_flight: I,
    completed: &[Job],
    failed: &[Job],
    concurrency_limit: usize,
    now: Timestamp,
) -> ProgressSnapshot
where
    I: IntoIterator<Item = &'a Job>,
{
    let in_flight: Vec<&Job> = in_flight.into_iter().collect();
    let mean = mean_duration(completed);

    ProgressSnapshot {
        total: pending + in_flight.len() + completed.len() + failed.len(),
        pending,
        in_flight: in_flight.len(),
        completed: completed.len(),
        failed: failed.len(),
        success_rate: success_rate(completed.len(), failed.len()),
        mean_duration_secs: mean,
        eta_secs: eta(pending, &in_flight, concurrency_limit, mean, now),
    }
}

/// Ratio of completed jobs among terminated jobs; 0.0 when none terminated.
pub fn success_rate(completed: usize, failed: usize) -> f64 {
    let terminated = completed + failed;
    if terminated == 0 {
        return 0.0;
    }
    completed as f64 / terminated as f64
}

/// Arithmetic mean of `completed_at - started_at` over completed jobs.
///
/// Returns `None` when no completed job carries both timestamps.
pub fn mean_duration(completed: &[Job]) -> Option<f64> {
    let durations: Vec<f64> = completed.iter().filter_map(Job::duration_secs).collect();
    if durations.is_empty() {
        return None;
    }
    Some(durations.iter().sum::<f64>() / durations.len() as f64)
}

/// Estimated seconds to drain the backlog.
///
/// `active_time` is the worst remaining time among running jobs (a job
/// already past the mean counts as finishing now); `queue_time` is the
/// number of admission waves left times the mean. An empty backlog is
/// always 0, even without a mean.
pub fn eta(
    pending: usize,
    in_flight: &[&Job],
    concurrency_limit: usize,
    mean: Option<f64>,
    now: Timestamp,
) -> Option<f64> {
    if pending == 0 && in_flight.is_empty() {
        return Some(0.0);
    }
    let mean = mean?;

    let active_time = in_flight
        .iter()
        .filter_map(|job| job.elapsed_secs(now))
        .map(|elapsed| (mean - elapsed).max(0.0))
        .fold(0.0, f64::max);

    let waves = pending as f64 / concurrency_limit.max(1) as f64;
    Some(active_time + waves * mean)
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// Render a duration for humans: hours above one hour, minutes above one
/// minute, whole seconds otherwise.
pub fn format_duration(secs: f64) -> String {
    if secs > SECS_PER_HOUR {
        format!("{:.1} h", secs / SECS_PER_HOUR)
    } else if secs > SECS_PER_MINUTE {
        format!("{:.1} min", secs / SECS_PER_MINUTE)
    } else {
        format!("{secs:.0} s")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
