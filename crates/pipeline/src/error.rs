/// Errors from constructing or driving a scheduler.
///
/// Per-job failures never surface here; they are recorded on the job and
/// reported through the event bus.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Invalid scheduler configuration: {0}")]
    InvalidConfig(String),
}
