//! simsweep: batch runner for network simulation parameter sweeps.
//!
//! This library enumerates the scenarios of a parameter sweep, runs each one
//! many times under a fixed concurrency bound, collects per-run statistics
//! files and ranks scenarios by their mean ratio.

pub mod aggregate;
pub mod build_step;
pub mod cli;
pub mod config;
pub mod error;
pub mod extractor;
pub mod runner;
pub mod scheduler;
pub mod sweep;

// Re-export commonly used error types
pub use config::ConfigError;
pub use error::{AggregateError, BuildError, ExtractionError, SweepError};
pub use scheduler::SchedulerError;
