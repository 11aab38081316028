//! Bounded-concurrency job scheduler.
//!
//! A [`Scheduler`] owns the pending queue, the in-flight set and the
//! completed / failed history. Each cycle runs one admission pass (fill the
//! in-flight window from the head of the queue) and one polling pass (ask the
//! remote about every in-flight job and materialize finished artifacts),
//! then sleeps for `poll_interval`.
//!
//! Remote calls are never made while the state lock is held. A job stays at
//! the head of `pending` while its submission is in progress and is moved in
//! a single write once the outcome is known, so it is always in exactly one
//! collection.

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use framecast_core::estimation::{self, ProgressSnapshot};
use framecast_core::job::{FailureStage, Job, JobFailure, JobRequest, JobState};
use framecast_core::remote::{RemoteJobClient, RemoteStatus};
use framecast_core::types::JobId;
use framecast_events::{EventBus, JobEvent};
use futures::FutureExt;
use tokio::sync::{broadcast, Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::SchedulerConfig;
use crate::error::SchedulerError;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<Job>,
    /// Keyed by remote job id.
    in_flight: HashMap<String, Job>,
    completed: Vec<Job>,
    failed: Vec<Job>,
    next_id: JobId,
}

/// Point-in-time copy of every job, grouped by collection.
///
/// `pending` is in admission order, `in_flight` is sorted by job id and the
/// histories are in the order jobs were observed to terminate.
#[derive(Debug, Clone, Default)]
pub struct JobsView {
    pub pending: Vec<Job>,
    pub in_flight: Vec<Job>,
    pub completed: Vec<Job>,
    pub failed: Vec<Job>,
}

impl JobsView {
    pub fn total(&self) -> usize {
        self.pending.len() + self.in_flight.len() + self.completed.len() + self.failed.len()
    }
}

struct LoopHandle {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct Inner {
    config: SchedulerConfig,
    client: Arc<dyn RemoteJobClient>,
    events: Arc<EventBus>,
    state: RwLock<QueueState>,
    /// Wakes a sleeping loop after an enqueue.
    wake: Notify,
    /// Serializes passes between the loop and direct callers.
    cycle: Mutex<()>,
    runner: Mutex<Option<LoopHandle>>,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Handle to one scheduler instance. Clones share the same state.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        client: Arc<dyn RemoteJobClient>,
        events: Arc<EventBus>,
    ) -> Result<Self, SchedulerError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                client,
                events,
                state: RwLock::new(QueueState::default()),
                wake: Notify::new(),
                cycle: Mutex::new(()),
                runner: Mutex::new(None),
            }),
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Subscribe to lifecycle events published by this scheduler.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.inner.events.subscribe()
    }

    /// Append a job to the pending queue.
    ///
    /// A running loop is woken for an extra admission pass. When the loop is
    /// not running and `admit_on_enqueue` is set, the admission pass runs
    /// here before returning.
    ///
    /// Inputs are not validated; a missing image surfaces later as a
    /// submission failure.
    pub async fn enqueue(&self, request: JobRequest) -> JobId {
        let id = {
            let mut state = self.inner.state.write().await;
            state.next_id += 1;
            let id = state.next_id;
            state.pending.push_back(Job::new(id, request, Utc::now()));
            id
        };
        tracing::debug!(job_id = id, "Job enqueued");

        if self.inner.config.admit_on_enqueue && !self.is_running().await {
            let _cycle = self.inner.cycle.lock().await;
            self.inner.admission_pass().await;
        } else {
            self.inner.wake.notify_one();
        }
        id
    }

    /// Enqueue several jobs in order, returning their ids.
    pub async fn enqueue_all<I>(&self, requests: I) -> Vec<JobId>
    where
        I: IntoIterator<Item = JobRequest>,
    {
        let mut ids = Vec::new();
        for request in requests {
            ids.push(self.enqueue(request).await);
        }
        ids
    }

    /// Admit pending jobs until the in-flight window is full or the queue
    /// is empty. Returns the number of jobs accepted by the remote.
    pub async fn admission_pass(&self) -> usize {
        let _cycle = self.inner.cycle.lock().await;
        self.inner.admission_pass().await
    }

    /// Poll every in-flight job once. Returns the number of jobs that
    /// reached a terminal state.
    pub async fn polling_pass(&self) -> usize {
        let _cycle = self.inner.cycle.lock().await;
        self.inner.polling_pass().await
    }

    /// One admission pass followed by one polling pass.
    pub async fn run_cycle(&self) {
        let _cycle = self.inner.cycle.lock().await;
        self.inner.run_cycle().await;
    }

    /// Spawn the scheduling loop. Returns `false` if it was already running.
    pub async fn start(&self) -> bool {
        let mut runner = self.inner.runner.lock().await;
        if runner.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            tracing::debug!("Scheduler already running");
            return false;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Arc::clone(&self.inner).run(cancel.clone()));
        *runner = Some(LoopHandle { cancel, handle });
        true
    }

    /// Request cooperative shutdown and wait up to `stop_timeout` for the
    /// current cycle to finish. In-flight jobs are kept and resume polling
    /// after the next [`start`](Self::start).
    ///
    /// Returns `false` if the loop was not running.
    pub async fn stop(&self) -> bool {
        let Some(LoopHandle { cancel, handle }) = self.inner.runner.lock().await.take() else {
            return false;
        };

        cancel.cancel();
        let stop_timeout = self.inner.config.stop_timeout;
        match tokio::time::timeout(stop_timeout, handle).await {
            Ok(Ok(())) => tracing::info!("Scheduler stopped"),
            Ok(Err(e)) => tracing::error!(error = %e, "Scheduler loop task failed"),
            Err(_) => tracing::warn!(
                timeout_ms = stop_timeout.as_millis() as u64,
                "Scheduler loop still busy; it will exit after the current cycle",
            ),
        }
        true
    }

    pub async fn is_running(&self) -> bool {
        self.inner
            .runner
            .lock()
            .await
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    /// `true` once nothing is pending or in flight.
    pub async fn is_drained(&self) -> bool {
        let state = self.inner.state.read().await;
        state.pending.is_empty() && state.in_flight.is_empty()
    }

    /// Progress statistics computed from the current state.
    pub async fn snapshot(&self) -> ProgressSnapshot {
        let state = self.inner.state.read().await;
        estimation::estimate(
            state.pending.len(),
            state.in_flight.values(),
            &state.completed,
            &state.failed,
            self.inner.config.concurrency_limit,
            Utc::now(),
        )
    }

    pub async fn jobs(&self) -> JobsView {
        let state = self.inner.state.read().await;
        let mut in_flight: Vec<Job> = state.in_flight.values().cloned().collect();
        in_flight.sort_by_key(|job| job.id);
        JobsView {
            pending: state.pending.iter().cloned().collect(),
            in_flight,
            completed: state.completed.clone(),
            failed: state.failed.clone(),
        }
    }

    /// Look up a job by id in any collection.
    pub async fn job(&self, id: JobId) -> Option<Job> {
        let state = self.inner.state.read().await;
        state
            .pending
            .iter()
            .chain(state.in_flight.values())
            .chain(state.completed.iter())
            .chain(state.failed.iter())
            .find(|job| job.id == id)
            .cloned()
    }
}

// ---------------------------------------------------------------------------
// Loop and passes
// ---------------------------------------------------------------------------

impl Inner {
    async fn run(self: Arc<Self>, cancel: CancellationToken) {
        tracing::info!(
            concurrency_limit = self.config.concurrency_limit,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "Scheduler loop started",
        );

        loop {
            {
                let _cycle = self.cycle.lock().await;
                self.run_cycle().await;
            }

            let deadline = tokio::time::Instant::now() + self.config.poll_interval;
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        tracing::info!("Scheduler loop shutting down");
                        return;
                    }
                    _ = tokio::time::sleep_until(deadline) => break,
                    _ = self.wake.notified() => {
                        let _cycle = self.cycle.lock().await;
                        self.admission_pass().await;
                    }
                }
            }
        }
    }

    async fn run_cycle(&self) {
        self.admission_pass().await;
        self.polling_pass().await;
    }

    async fn admission_pass(&self) -> usize {
        let mut admitted = 0;

        loop {
            let next = {
                let state = self.state.read().await;
                if state.in_flight.len() >= self.config.concurrency_limit {
                    break;
                }
                match state.pending.front() {
                    Some(job) => job.clone(),
                    None => break,
                }
            };

            let request = &next.request;
            let submitted = AssertUnwindSafe(self.client.submit(
                &request.image,
                &request.prompt,
                &request.model,
            ))
            .catch_unwind()
            .await;
            let submitted = match submitted {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(panic) => Err(panic_message(panic)),
            };
            let now = Utc::now();

            let event = {
                let mut state = self.state.write().await;
                let position = state.pending.iter().position(|job| job.id == next.id);
                let Some(mut job) = position.and_then(|pos| state.pending.remove(pos)) else {
                    continue;
                };

                match submitted {
                    Ok(remote_id) if !state.in_flight.contains_key(&remote_id) => {
                        job.mark_submitted(remote_id.clone(), now);
                        tracing::info!(job_id = job.id, remote_job_id = %remote_id, "Job admitted");
                        admitted += 1;
                        let event = JobEvent::started(&job);
                        state.in_flight.insert(remote_id, job);
                        event
                    }
                    Ok(remote_id) => {
                        job.mark_failed(
                            JobFailure::new(
                                FailureStage::Submission,
                                format!("remote job id {remote_id} is already in flight"),
                            ),
                            now,
                        );
                        tracing::error!(job_id = job.id, remote_job_id = %remote_id, "Duplicate remote job id");
                        let event = JobEvent::failed(&job);
                        state.failed.push(job);
                        event
                    }
                    Err(message) => {
                        tracing::error!(job_id = job.id, error = %message, "Job submission failed");
                        job.mark_failed(JobFailure::new(FailureStage::Submission, message), now);
                        let event = JobEvent::failed(&job);
                        state.failed.push(job);
                        event
                    }
                }
            };
            self.events.publish(event);
        }

        self.events.publish(JobEvent::queue_changed());
        admitted
    }

    async fn polling_pass(&self) -> usize {
        let mut visiting: Vec<Job> = {
            let state = self.state.read().await;
            state.in_flight.values().cloned().collect()
        };
        visiting.sort_by_key(|job| job.id);

        for job in &mut visiting {
            let visited = AssertUnwindSafe(self.visit(job)).catch_unwind().await;
            if let Err(panic) = visited {
                let message = panic_message(panic);
                let stage = match job.state {
                    JobState::Resolving => FailureStage::Resolution,
                    JobState::Downloading => FailureStage::Download,
                    _ => FailureStage::Polling,
                };
                tracing::error!(job_id = job.id, stage = stage.as_str(), error = %message, "Remote client panicked");
                job.mark_failed(JobFailure::new(stage, message), Utc::now());
            }
        }

        let mut events = Vec::new();
        {
            let mut state = self.state.write().await;
            for job in visiting {
                let Some(remote_id) = job.remote_job_id.clone() else {
                    continue;
                };
                if !job.is_terminal() {
                    if let Some(slot) = state.in_flight.get_mut(&remote_id) {
                        *slot = job;
                    }
                    continue;
                }

                state.in_flight.remove(&remote_id);
                if job.state == JobState::Completed {
                    events.push(JobEvent::completed(&job));
                    state.completed.push(job);
                } else {
                    events.push(JobEvent::failed(&job));
                    state.failed.push(job);
                }
            }
        }

        let terminated = events.len();
        for event in events {
            self.events.publish(event);
        }
        self.events.publish(JobEvent::queue_changed());
        terminated
    }

    /// Poll one job and carry it as far as the remote status allows.
    async fn visit(&self, job: &mut Job) {
        let Some(remote_id) = job.remote_job_id.clone() else {
            return;
        };

        match self.client.poll(&remote_id).await {
            Ok(RemoteStatus::Processing) => {
                let polls = job.record_processing_poll();
                tracing::debug!(job_id = job.id, polls, "Job still processing");
                if let Some(max) = self.config.max_processing_polls {
                    if polls >= max {
                        tracing::warn!(job_id = job.id, polls, "Job timed out");
                        job.mark_failed(
                            JobFailure::new(
                                FailureStage::Timeout,
                                format!("still processing after {polls} polls"),
                            ),
                            Utc::now(),
                        );
                    }
                }
            }
            Ok(RemoteStatus::Success { artifact_ref }) => {
                self.materialize(job, artifact_ref).await;
            }
            Ok(RemoteStatus::Failure { reason }) => {
                tracing::error!(job_id = job.id, error = %reason, "Remote reported job failure");
                job.mark_failed(JobFailure::new(FailureStage::Remote, reason), Utc::now());
            }
            Err(e) => {
                tracing::error!(job_id = job.id, error = %e, "Job poll failed");
                job.mark_failed(JobFailure::new(FailureStage::Polling, e.to_string()), Utc::now());
            }
        }
    }

    /// Resolve the artifact of a remotely finished job and download it.
    async fn materialize(&self, job: &mut Job, artifact_ref: String) {
        job.mark_resolving(artifact_ref.clone());
        self.sync_in_flight(job).await;

        let url = match self.client.resolve(&artifact_ref).await {
            Ok(url) => url,
            Err(e) => {
                tracing::error!(job_id = job.id, artifact_ref = %artifact_ref, error = %e, "Artifact resolution failed");
                job.mark_failed(JobFailure::new(FailureStage::Resolution, e.to_string()), Utc::now());
                return;
            }
        };

        job.mark_downloading();
        self.sync_in_flight(job).await;

        match self.client.fetch(&url, &job.request.destination).await {
            Ok(bytes) => {
                job.mark_completed(Utc::now());
                tracing::info!(
                    job_id = job.id,
                    destination = %job.request.destination.display(),
                    bytes,
                    duration_secs = job.duration_secs().unwrap_or_default(),
                    "Job completed",
                );
            }
            Err(e) => {
                tracing::error!(job_id = job.id, error = %e, "Artifact download failed");
                job.mark_failed(JobFailure::new(FailureStage::Download, e.to_string()), Utc::now());
            }
        }
    }

    /// Publish a non-terminal sub-phase to readers.
    async fn sync_in_flight(&self, job: &Job) {
        let Some(remote_id) = job.remote_job_id.as_deref() else {
            return;
        };
        let mut state = self.state.write().await;
        if let Some(slot) = state.in_flight.get_mut(remote_id) {
            slot.clone_from(job);
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("remote client panicked: {msg}")
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("remote client panicked: {msg}")
    } else {
        "remote client panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_message_handles_str_and_string_payloads() {
        assert_eq!(
            panic_message(Box::new("boom")),
            "remote client panicked: boom"
        );
        assert_eq!(
            panic_message(Box::new(String::from("bang"))),
            "remote client panicked: bang"
        );
        assert_eq!(panic_message(Box::new(42_u8)), "remote client panicked");
    }

    fn job(id: JobId) -> Job {
        let request = JobRequest::new("/in/a.png", "pan", "/out/a.mp4", "I2V-01-Director");
        Job::new(id, request, Utc::now())
    }

    #[test]
    fn jobs_view_total_counts_every_collection() {
        assert_eq!(JobsView::default().total(), 0);

        let view = JobsView {
            pending: vec![job(1)],
            in_flight: vec![job(2)],
            completed: vec![job(3)],
            failed: vec![job(4)],
        };
        assert_eq!(view.total(), 4);

        let view = JobsView {
            completed: vec![job(1), job(2)],
            ..JobsView::default()
        };
        assert_eq!(view.total(), 2);
    }
}
