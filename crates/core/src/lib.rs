//! Domain types and pure logic for the framecast batch video generator.
//!
//! Holds the job record and its state machine, the remote client seam,
//! progress estimation, batch planning and the prompt library. This crate
//! has no internal dependencies so every other crate can build on it.

pub mod batch;
pub mod error;
pub mod estimation;
pub mod job;
pub mod prompt_library;
pub mod remote;
pub mod types;
