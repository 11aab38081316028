//! Job record and per-job lifecycle state machine.
//!
//! A [`Job`] is created in [`JobState::Queued`] when a caller enqueues a
//! [`JobRequest`] and ends in exactly one of [`JobState::Completed`] or
//! [`JobState::Failed`]. The transition helpers keep the timestamp and
//! remote-id fields consistent with the state:
//!
//! - `remote_job_id` is set once the job has been accepted by the remote
//!   API and stays set for the rest of its life.
//! - `completed_at` is set iff the state is terminal.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::{JobId, Timestamp};

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Immutable inputs of a job, as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    /// Source image sent as the first frame.
    pub image: PathBuf,
    /// Text prompt describing the motion / scene.
    pub prompt: String,
    /// Remote model identifier, e.g. `I2V-01-Director`.
    pub model: String,
    /// Where the generated video is written.
    pub destination: PathBuf,
}

impl JobRequest {
    pub fn new(
        image: impl Into<PathBuf>,
        prompt: impl Into<String>,
        destination: impl Into<PathBuf>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            image: image.into(),
            prompt: prompt.into(),
            model: model.into(),
            destination: destination.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Lifecycle state of a job.
///
/// `Submitted` is transient (immediately followed by `Polling`), and
/// `Resolving` / `Downloading` are the sub-phases between a remote success
/// and the artifact landing on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Submitted,
    Polling,
    Resolving,
    Downloading,
    Completed,
    Failed,
}

impl JobState {
    /// `true` for `Completed` and `Failed`. No transition leaves these.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Submitted => "submitted",
            Self::Polling => "polling",
            Self::Resolving => "resolving",
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Failure
// ---------------------------------------------------------------------------

/// The phase in which a job failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// The remote API rejected job creation.
    Submission,
    /// The status query itself errored (transport or API error).
    Polling,
    /// The remote API reported the job as failed.
    Remote,
    /// The remote reported success but the artifact could not be located.
    Resolution,
    /// The artifact was located but could not be saved locally.
    Download,
    /// The job stayed in processing for more polls than allowed.
    Timeout,
}

impl FailureStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submission => "submission",
            Self::Polling => "polling",
            Self::Remote => "remote",
            Self::Resolution => "resolution",
            Self::Download => "download",
            Self::Timeout => "timeout",
        }
    }
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error detail recorded on a failed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub stage: FailureStage,
    /// Error message, recorded verbatim.
    pub message: String,
}

impl JobFailure {
    pub fn new(stage: FailureStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.message)
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// One image-to-video request tracked end-to-end by the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub request: JobRequest,
    pub state: JobState,
    /// Id assigned by the remote API on submission.
    pub remote_job_id: Option<String>,
    /// Remote artifact reference, assigned on remote success.
    pub artifact_ref: Option<String>,
    pub error: Option<JobFailure>,
    pub enqueued_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    /// Consecutive polls that reported the job as still processing.
    #[serde(default)]
    pub processing_polls: u32,
}

impl Job {
    /// Create a job in the `Queued` state.
    pub fn new(id: JobId, request: JobRequest, enqueued_at: Timestamp) -> Self {
        Self {
            id,
            request,
            state: JobState::Queued,
            remote_job_id: None,
            artifact_ref: None,
            error: None,
            enqueued_at,
            started_at: None,
            completed_at: None,
            processing_polls: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Record acceptance by the remote API and enter the polling phase.
    pub fn mark_submitted(&mut self, remote_job_id: String, now: Timestamp) {
        self.remote_job_id = Some(remote_job_id);
        self.state = JobState::Submitted;
        self.started_at = Some(now);
        self.state = JobState::Polling;
    }

    /// Count one still-processing poll and return the running total.
    pub fn record_processing_poll(&mut self) -> u32 {
        self.processing_polls = self.processing_polls.saturating_add(1);
        self.processing_polls
    }

    /// The remote reported success; the artifact is being located.
    pub fn mark_resolving(&mut self, artifact_ref: String) {
        self.artifact_ref = Some(artifact_ref);
        self.state = JobState::Resolving;
    }

    pub fn mark_downloading(&mut self) {
        self.state = JobState::Downloading;
    }

    pub fn mark_completed(&mut self, now: Timestamp) {
        self.state = JobState::Completed;
        self.completed_at = Some(now);
    }

    pub fn mark_failed(&mut self, failure: JobFailure, now: Timestamp) {
        self.state = JobState::Failed;
        self.error = Some(failure);
        self.completed_at = Some(now);
    }

    /// Wall-clock processing time in seconds (`completed_at - started_at`).
    ///
    /// `None` unless the job was started and has terminated.
    pub fn duration_secs(&self) -> Option<f64> {
        let started = self.started_at?;
        let completed = self.completed_at?;
        Some(seconds_between(started, completed))
    }

    /// Seconds since the job was admitted, or `None` if never admitted.
    pub fn elapsed_secs(&self, now: Timestamp) -> Option<f64> {
        self.started_at.map(|started| seconds_between(started, now))
    }
}

fn seconds_between(from: Timestamp, to: Timestamp) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
