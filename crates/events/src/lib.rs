//! Job lifecycle events for the framecast scheduler.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`JobEvent`]: the lifecycle event enum (started, completed, failed,
//!   queue changed).
//! - [`EventJournal`]: background service appending job events to a
//!   JSON-lines file.

pub mod bus;
pub mod journal;

pub use bus::{EventBus, JobEvent};
pub use journal::{EventJournal, JournalError};
