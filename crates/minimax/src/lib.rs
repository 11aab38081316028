//! MiniMax image-to-video API client.
//!
//! Provides typed response decoding and a REST wrapper that implements
//! [`framecast_core::remote::RemoteJobClient`] for the scheduler.

pub mod api;
pub mod error;
pub mod responses;

pub use api::{MiniMaxApi, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use error::MiniMaxError;
