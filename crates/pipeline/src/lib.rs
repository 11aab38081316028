//! Job scheduling for framecast.
//!
//! [`Scheduler`] admits queued jobs up to a concurrency limit, polls the
//! remote service for each admitted job and downloads finished artifacts,
//! publishing lifecycle events on an [`EventBus`](framecast_events::EventBus).

pub mod config;
pub mod error;
pub mod scheduler;

pub use config::SchedulerConfig;
pub use error::SchedulerError;
pub use scheduler::{JobsView, Scheduler};
