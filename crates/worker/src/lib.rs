//! Command-line host for the framecast scheduler.

pub mod cli;
pub mod config;
pub mod reporter;
