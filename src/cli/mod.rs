//! Command-line subcommands.

pub mod clean;
pub mod config;
pub mod metrics;
pub mod snapshot;
pub mod submit;
