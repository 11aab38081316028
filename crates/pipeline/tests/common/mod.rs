#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use framecast_core::job::JobRequest;
use framecast_core::remote::{RemoteError, RemoteJobClient, RemoteStatus};
use framecast_events::{EventBus, JobEvent};
use framecast_pipeline::{Scheduler, SchedulerConfig};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Scripted remote client
// ---------------------------------------------------------------------------

/// One call made against the [`ScriptedClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Submit(PathBuf),
    Poll(String),
    Resolve(String),
    Fetch(String, PathBuf),
}

/// In-memory [`RemoteJobClient`] driven by per-job scripts.
///
/// Successful submissions are assigned `task-1`, `task-2`, ... in order,
/// unless the image was given a fixed task id with `assign_task`.
/// Polls pop the next scripted status for the task; an exhausted script
/// reports `Processing`. Resolution maps `file-x` to
/// `https://cdn.test/file-x.mp4`.
#[derive(Default)]
pub struct ScriptedClient {
    next_task: AtomicU64,
    failing_submits: Mutex<HashSet<PathBuf>>,
    panicking_submits: Mutex<HashSet<PathBuf>>,
    assigned_tasks: Mutex<HashMap<PathBuf, String>>,
    polls: Mutex<HashMap<String, VecDeque<Result<RemoteStatus, String>>>>,
    panicking_polls: Mutex<HashSet<String>>,
    failing_resolves: Mutex<HashSet<String>>,
    panicking_resolves: Mutex<HashSet<String>>,
    failing_fetches: Mutex<HashSet<PathBuf>>,
    panicking_fetches: Mutex<HashSet<PathBuf>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_submit(&self, image: impl Into<PathBuf>) {
        self.failing_submits.lock().unwrap().insert(image.into());
    }

    pub fn panic_on_submit(&self, image: impl Into<PathBuf>) {
        self.panicking_submits.lock().unwrap().insert(image.into());
    }

    /// Make the remote hand out `task_id` when `image` is submitted.
    pub fn assign_task(&self, image: impl Into<PathBuf>, task_id: &str) {
        self.assigned_tasks
            .lock()
            .unwrap()
            .insert(image.into(), task_id.to_string());
    }

    pub fn script<I>(&self, task_id: &str, steps: I)
    where
        I: IntoIterator<Item = Result<RemoteStatus, String>>,
    {
        self.polls
            .lock()
            .unwrap()
            .entry(task_id.to_string())
            .or_default()
            .extend(steps);
    }

    pub fn panic_on_poll(&self, task_id: &str) {
        self.panicking_polls.lock().unwrap().insert(task_id.to_string());
    }

    pub fn fail_resolve(&self, artifact_ref: &str) {
        self.failing_resolves
            .lock()
            .unwrap()
            .insert(artifact_ref.to_string());
    }

    pub fn panic_on_resolve(&self, artifact_ref: &str) {
        self.panicking_resolves
            .lock()
            .unwrap()
            .insert(artifact_ref.to_string());
    }

    pub fn panic_on_fetch(&self, destination: impl Into<PathBuf>) {
        self.panicking_fetches.lock().unwrap().insert(destination.into());
    }

    pub fn fail_fetch(&self, destination: impl Into<PathBuf>) {
        self.failing_fetches.lock().unwrap().insert(destination.into());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn polls_of(&self, task_id: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Poll(id) if id == task_id))
            .count()
    }

    pub fn submits(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Submit(_)))
            .count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl RemoteJobClient for ScriptedClient {
    async fn submit(&self, image: &Path, _prompt: &str, _model: &str) -> Result<String, RemoteError> {
        self.record(Call::Submit(image.to_path_buf()));
        if self.failing_submits.lock().unwrap().contains(image) {
            return Err(RemoteError::Transport("connection refused".to_string()));
        }
        if self.panicking_submits.lock().unwrap().contains(image) {
            panic!("scripted panic for {}", image.display());
        }
        if let Some(task_id) = self.assigned_tasks.lock().unwrap().get(image) {
            return Ok(task_id.clone());
        }
        let n = self.next_task.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("task-{n}"))
    }

    async fn poll(&self, remote_job_id: &str) -> Result<RemoteStatus, RemoteError> {
        self.record(Call::Poll(remote_job_id.to_string()));
        if self.panicking_polls.lock().unwrap().contains(remote_job_id) {
            panic!("scripted panic for {remote_job_id}");
        }
        let step = self
            .polls
            .lock()
            .unwrap()
            .get_mut(remote_job_id)
            .and_then(VecDeque::pop_front);
        match step {
            Some(Ok(status)) => Ok(status),
            Some(Err(message)) => Err(RemoteError::Transport(message)),
            None => Ok(RemoteStatus::Processing),
        }
    }

    async fn resolve(&self, artifact_ref: &str) -> Result<String, RemoteError> {
        self.record(Call::Resolve(artifact_ref.to_string()));
        if self.panicking_resolves.lock().unwrap().contains(artifact_ref) {
            panic!("scripted panic for {artifact_ref}");
        }
        if self.failing_resolves.lock().unwrap().contains(artifact_ref) {
            return Err(RemoteError::MalformedResponse(
                "missing file.download_url".to_string(),
            ));
        }
        Ok(format!("https://cdn.test/{artifact_ref}.mp4"))
    }

    async fn fetch(&self, url: &str, destination: &Path) -> Result<u64, RemoteError> {
        self.record(Call::Fetch(url.to_string(), destination.to_path_buf()));
        if self.panicking_fetches.lock().unwrap().contains(destination) {
            panic!("scripted panic for {}", destination.display());
        }
        if self.failing_fetches.lock().unwrap().contains(destination) {
            return Err(RemoteError::Api {
                status: 403,
                body: "expired signature".to_string(),
            });
        }
        Ok(1024)
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn processing() -> Result<RemoteStatus, String> {
    Ok(RemoteStatus::Processing)
}

pub fn success(artifact_ref: &str) -> Result<RemoteStatus, String> {
    Ok(RemoteStatus::Success {
        artifact_ref: artifact_ref.to_string(),
    })
}

pub fn failure(reason: &str) -> Result<RemoteStatus, String> {
    Ok(RemoteStatus::Failure {
        reason: reason.to_string(),
    })
}

pub fn image(name: &str) -> PathBuf {
    PathBuf::from(format!("/in/{name}.png"))
}

pub fn destination(name: &str) -> PathBuf {
    PathBuf::from(format!("/out/{name}_video_1.mp4"))
}

pub fn request(name: &str) -> JobRequest {
    JobRequest::new(
        image(name),
        format!("slow pan over {name}"),
        destination(name),
        "I2V-01-Director",
    )
}

/// Config for tests that drive passes by hand: enqueue never admits.
pub fn config(limit: usize) -> SchedulerConfig {
    SchedulerConfig::default()
        .with_concurrency_limit(limit)
        .with_poll_interval(Duration::from_secs(10))
        .with_admit_on_enqueue(false)
}

/// Build a scheduler over `client` and a receiver subscribed before any
/// event is published.
pub fn scheduler(
    client: &Arc<ScriptedClient>,
    config: SchedulerConfig,
) -> (Scheduler, broadcast::Receiver<JobEvent>) {
    let events = Arc::new(EventBus::default());
    let rx = events.subscribe();
    let scheduler = Scheduler::new(config, client.clone(), events).unwrap();
    (scheduler, rx)
}

/// Collect every event currently buffered on `rx`.
pub fn drain(rx: &mut broadcast::Receiver<JobEvent>) -> Vec<JobEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Event types in order, without `queue_changed` noise.
pub fn lifecycle(events: &[JobEvent]) -> Vec<(&'static str, u64)> {
    events
        .iter()
        .filter_map(|event| event.job().map(|job| (event.event_type(), job.id)))
        .collect()
}

/// Wait (in tokio time) for the next event of `event_type`.
pub async fn wait_for(rx: &mut broadcast::Receiver<JobEvent>, event_type: &str) -> JobEvent {
    tokio::time::timeout(Duration::from_secs(300), async {
        loop {
            match rx.recv().await {
                Ok(event) if event.event_type() == event_type => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event bus closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}
