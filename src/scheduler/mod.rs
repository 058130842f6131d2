//! Concurrency-bounded scheduling of simulator runs.
//!
//! This module provides the machinery that turns a list of job specs into
//! finished, post-processed runs:
//!
//! - **JobScheduler**: Admits jobs up to a capacity and launches one process per job
//! - **CompletionHandler**: Extracts statistics, relocates artifacts, removes scratch
//! - **SchedulerContext**: Shared counters (active, invalid runs, next id)
//! - **JobRecord**: A job's identity, command, directories and lifecycle state
//!
//! # Lifecycle
//!
//! ```text
//!   submit ──► acquire slot ──► Pending ──► Running ──► process exit
//!                                                           │
//!                          release slot ◄── cleanup ◄── relocate ◄── extract
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use simsweep::extractor::NoopExtractor;
//! use simsweep::scheduler::{JobScheduler, JobSpec, SchedulerConfig};
//! use std::sync::Arc;
//!
//! let config = SchedulerConfig::new(22).with_scratch_root("./ramdisk");
//! let mut scheduler = JobScheduler::new(config, Arc::new(NoopExtractor))?;
//!
//! let spec = JobSpec::simulation("build/sim", "BestRoute", &params, 0, "output/BestRoute/output_run0");
//! scheduler.submit(spec).await?;
//!
//! let outcomes = scheduler.await_drain().await;
//! println!("invalid runs: {}", scheduler.stats().invalid_runs);
//! ```

pub mod completion;
pub mod context;
pub mod job;
pub mod worker_pool;

pub use completion::{is_stats_file, relocate_stats, CompletionHandler, ProcessExit};
pub use context::{SchedulerContext, SchedulerStats};
pub use job::{JobId, JobOutcome, JobRecord, JobSpec, JobState};
pub use worker_pool::{JobScheduler, SchedulerConfig, SchedulerError};
