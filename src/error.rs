//! Error types for simsweep operations.
//!
//! Defines error types for the subsystems that can fail outside a single job:
//! - Statistics extraction (per job, always recovered by the completion path)
//! - The pre-flight build step
//! - Result aggregation and summary writing
//! - Sweep enumeration and setup

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by a statistics extractor for one finished job.
///
/// These never escape the completion path: they are counted as invalid runs.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Failed to start extractor '{command}': {reason}")]
    SpawnFailed { command: String, reason: String },

    #[error("Extractor exited with code {code:?} for '{}'", .scratch_dir.display())]
    NonZeroExit {
        code: Option<i32>,
        scratch_dir: PathBuf,
    },

    #[error("No simulator traces found in '{}'", .0.display())]
    MissingTraces(PathBuf),

    #[error("Extraction failed: {0}")]
    Failed(String),

    #[error("Extractor panicked: {0}")]
    Panicked(String),
}

/// Errors from the pre-flight build step.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Build command is empty")]
    EmptyCommand,

    #[error("Failed to start build command '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Build command '{command}' exited with code {code:?}")]
    NonZeroExit { command: String, code: Option<i32> },

    #[error("Simulator executable not found after build: {}", .0.display())]
    ExecutableMissing(PathBuf),
}

/// Errors that abort aggregation as a whole.
///
/// Unreadable statistics files and unparsable ratio lines are skipped,
/// not reported here.
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("Output root does not exist: {}", .0.display())]
    MissingRoot(PathBuf),

    #[error("Failed to write summary '{}': {source}", .path.display())]
    WriteSummary {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that stop a sweep before or after scheduling.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] crate::scheduler::SchedulerError),

    #[error("Aggregation error: {0}")]
    Aggregate(#[from] AggregateError),

    #[error("Background task failed: {0}")]
    TaskFailed(String),

    #[error("Output root '{}' is not writable: {source}", .path.display())]
    OutputNotWritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
