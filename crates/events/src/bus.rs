//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`JobEvent`]s. The
//! scheduler publishes from its own loop, one event per occurrence and in
//! order; hosts subscribe to re-render or log. Share it via `Arc<EventBus>`.

use chrono::Utc;
use framecast_core::job::Job;
use framecast_core::types::Timestamp;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Event type names
// ---------------------------------------------------------------------------

/// A job was accepted by the remote API and is now being polled.
pub const EVENT_JOB_STARTED: &str = "job_started";

/// A job's artifact was downloaded.
pub const EVENT_JOB_COMPLETED: &str = "job_completed";

/// A job failed at any stage.
pub const EVENT_JOB_FAILED: &str = "job_failed";

/// An admission or polling pass finished; hosts should re-render.
pub const EVENT_QUEUE_CHANGED: &str = "queue_changed";

// ---------------------------------------------------------------------------
// JobEvent
// ---------------------------------------------------------------------------

/// A lifecycle event emitted by the scheduler.
///
/// Job-carrying variants hold a snapshot of the job taken at the moment of
/// the transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    #[serde(rename = "job_started")]
    Started { job: Box<Job>, at: Timestamp },

    #[serde(rename = "job_completed")]
    Completed { job: Box<Job>, at: Timestamp },

    #[serde(rename = "job_failed")]
    Failed { job: Box<Job>, at: Timestamp },

    QueueChanged { at: Timestamp },
}

impl JobEvent {
    pub fn started(job: &Job) -> Self {
        Self::Started {
            job: Box::new(job.clone()),
            at: Utc::now(),
        }
    }

    pub fn completed(job: &Job) -> Self {
        Self::Completed {
            job: Box::new(job.clone()),
            at: Utc::now(),
        }
    }

    pub fn failed(job: &Job) -> Self {
        Self::Failed {
            job: Box::new(job.clone()),
            at: Utc::now(),
        }
    }

    pub fn queue_changed() -> Self {
        Self::QueueChanged { at: Utc::now() }
    }

    /// Stable event name, e.g. `"job_completed"`.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Started { .. } => EVENT_JOB_STARTED,
            Self::Completed { .. } => EVENT_JOB_COMPLETED,
            Self::Failed { .. } => EVENT_JOB_FAILED,
            Self::QueueChanged { .. } => EVENT_QUEUE_CHANGED,
        }
    }

    /// The job this event concerns, if any.
    pub fn job(&self) -> Option<&Job> {
        match self {
            Self::Started { job, .. } | Self::Completed { job, .. } | Self::Failed { job, .. } => {
                Some(job.as_ref())
            }
            Self::QueueChanged { .. } => None,
        }
    }

    pub fn at(&self) -> Timestamp {
        match self {
            Self::Started { at, .. }
            | Self::Completed { at, .. }
            | Self::Failed { at, .. }
            | Self::QueueChanged { at } => *at,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`JobEvent`].
///
/// # Usage
///
/// ```rust
/// use framecast_events::bus::{EventBus, JobEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(JobEvent::queue_changed());
/// ```
pub struct EventBus {
    sender: broadcast::Sender<JobEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: JobEvent) {
        // Ignore the SendError: it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
