//! Concurrency-bounded job scheduler.
//!
//! Each admitted job runs as its own tokio task wrapping exactly one
//! simulator process. A counting semaphore caps the number of jobs in
//! flight; a job holds its permit until its completion path has finished.
//!
//! # Features
//!
//! - First-come-first-served admission, blocking while at capacity
//! - Startup stagger for the first `capacity` jobs
//! - Per-job stdout capture scoped to the process launch
//! - Launch failures flow through the completion path like any exit
//! - Drain that waits on every job handle and reports progress

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{scratch_dir_for, SweepConfig};
use crate::extractor::StatsExtractor;

use super::completion::{CompletionHandler, ProcessExit};
use super::context::{SchedulerContext, SchedulerStats};
use super::job::{JobId, JobOutcome, JobRecord, JobSpec};

/// Errors that can occur in the scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Capacity must allow at least one job.
    #[error("Scheduler capacity must be greater than 0")]
    InvalidCapacity,

    /// Drain progress needs a non-zero interval.
    #[error("Drain report interval must be greater than 0")]
    InvalidReportInterval,

    /// The admission semaphore was closed.
    #[error("Scheduler is closed")]
    Closed,

    /// The scratch root could not be created.
    #[error("Failed to create scratch root '{}': {source}", .path.display())]
    ScratchRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration for the job scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum number of jobs in flight.
    pub capacity: usize,
    /// Directory under which per-job scratch directories are created.
    pub scratch_root: PathBuf,
    /// Delay before launching each of the first `capacity` jobs.
    pub startup_stagger: Duration,
    /// Delay after a process exits before its completion path runs.
    pub settle_delay: Duration,
    /// How often the drain logs the number of active jobs.
    pub drain_report_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            capacity: crate::config::DEFAULT_CAPACITY,
            scratch_root: PathBuf::from("./ramdisk"),
            startup_stagger: Duration::from_secs(15),
            settle_delay: Duration::from_millis(500),
            drain_report_interval: Duration::from_secs(10),
        }
    }
}

impl SchedulerConfig {
    /// Creates a new configuration with the specified capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }

    /// Sets the scratch root.
    pub fn with_scratch_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_root = dir.into();
        self
    }

    /// Sets the startup stagger.
    pub fn with_startup_stagger(mut self, stagger: Duration) -> Self {
        self.startup_stagger = stagger;
        self
    }

    /// Sets the post-exit settle delay.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Sets the drain progress interval.
    pub fn with_drain_report_interval(mut self, interval: Duration) -> Self {
        self.drain_report_interval = interval;
        self
    }

    fn validate(&self) -> Result<(), SchedulerError> {
        if self.capacity == 0 {
            return Err(SchedulerError::InvalidCapacity);
        }
        if self.drain_report_interval.is_zero() {
            return Err(SchedulerError::InvalidReportInterval);
        }
        Ok(())
    }
}

impl From<&SweepConfig> for SchedulerConfig {
    fn from(config: &SweepConfig) -> Self {
        Self {
            capacity: config.capacity,
            scratch_root: config.scratch_root.clone(),
            startup_stagger: config.startup_stagger,
            settle_delay: config.settle_delay,
            drain_report_interval: config.drain_report_interval,
        }
    }
}

/// Admits jobs up to a fixed capacity and runs each as an external process.
pub struct JobScheduler {
    config: SchedulerConfig,
    context: Arc<SchedulerContext>,
    slots: Arc<Semaphore>,
    handler: CompletionHandler,
    handles: Vec<(JobId, JoinHandle<JobOutcome>)>,
}

impl JobScheduler {
    /// Creates a scheduler with a fresh context.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError` if the configuration is invalid or the
    /// scratch root cannot be created.
    pub fn new(
        config: SchedulerConfig,
        extractor: Arc<dyn StatsExtractor>,
    ) -> Result<Self, SchedulerError> {
        Self::with_context(config, extractor, Arc::new(SchedulerContext::new()))
    }

    /// Creates a scheduler sharing an existing context.
    pub fn with_context(
        config: SchedulerConfig,
        extractor: Arc<dyn StatsExtractor>,
        context: Arc<SchedulerContext>,
    ) -> Result<Self, SchedulerError> {
        config.validate()?;

        std::fs::create_dir_all(&config.scratch_root).map_err(|source| {
            SchedulerError::ScratchRoot {
                path: config.scratch_root.clone(),
                source,
            }
        })?;

        let handler = CompletionHandler::new(extractor, Arc::clone(&context));

        Ok(Self {
            slots: Arc::new(Semaphore::new(config.capacity)),
            config,
            context,
            handler,
            handles: Vec::new(),
        })
    }

    /// Submits a job, waiting until a slot is free.
    ///
    /// The job receives its id at admission. Each of the first `capacity`
    /// jobs waits for the startup stagger before its process is launched.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::Closed` if the scheduler was closed.
    pub async fn submit(&mut self, spec: JobSpec) -> Result<JobId, SchedulerError> {
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| SchedulerError::Closed)?;

        let id = self.context.allocate_id();
        let record = JobRecord::new(id, spec, scratch_dir_for(&self.config.scratch_root, id));
        let active = self.context.job_started();

        info!(
            job_id = id,
            scenario = %record.spec.scenario,
            run = record.spec.run_index,
            active = active,
            "Job admitted"
        );
        debug!(job_id = id, command = ?record.spec.command, "Job command");

        if (id as usize) < self.config.capacity && !self.config.startup_stagger.is_zero() {
            tokio::time::sleep(self.config.startup_stagger).await;
        }

        let handle = tokio::spawn(run_job(
            record,
            self.handler.clone(),
            Arc::clone(&self.context),
            self.config.settle_delay,
            permit,
        ));
        self.handles.push((id, handle));

        Ok(id)
    }

    /// Waits until every submitted job has finished its completion path.
    ///
    /// Returns the outcomes in submission order. A job task that panicked is
    /// logged and left out of the result.
    pub async fn await_drain(&mut self) -> Vec<JobOutcome> {
        let handles = std::mem::take(&mut self.handles);
        let (ids, handles): (Vec<JobId>, Vec<_>) = handles.into_iter().unzip();

        let mut joined = Box::pin(futures::future::join_all(handles));
        let mut ticker = tokio::time::interval(self.config.drain_report_interval);
        // The first tick completes immediately.
        ticker.tick().await;

        let results = loop {
            tokio::select! {
                results = &mut joined => break results,
                _ = ticker.tick() => {
                    info!(active = self.context.active_count(), "Active jobs");
                }
            }
        };

        let mut outcomes = Vec::with_capacity(results.len());
        for (id, result) in ids.into_iter().zip(results) {
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => error!(job_id = id, error = %e, "Job task panicked"),
            }
        }

        info!(finished = outcomes.len(), "All jobs drained");
        outcomes
    }

    /// Returns a snapshot of the scheduler counters.
    pub fn stats(&self) -> SchedulerStats {
        self.context.snapshot()
    }

    /// Returns the shared context.
    pub fn context(&self) -> &Arc<SchedulerContext> {
        &self.context
    }

    /// Returns the number of jobs submitted but not yet drained.
    pub fn pending_handles(&self) -> usize {
        self.handles.len()
    }
}

/// Body of one job task: launch, wait, settle, complete, release.
async fn run_job(
    mut record: JobRecord,
    handler: CompletionHandler,
    context: Arc<SchedulerContext>,
    settle_delay: Duration,
    permit: OwnedSemaphorePermit,
) -> JobOutcome {
    let exit = launch_and_wait(&mut record).await;

    if exit.launched {
        // Settle before the completion path reads the scratch directory.
        tokio::time::sleep(settle_delay).await;
    }

    info!(job_id = record.id, exit_code = ?exit.exit_code, "Job finished");
    let outcome = handler.complete(&mut record, exit).await;

    let remaining = context.job_finished(outcome.is_success());
    drop(permit);

    debug!(job_id = record.id, active = remaining, "Slot released");
    outcome
}

/// Prepares the scratch directory, starts the process and waits for it.
///
/// The stdout capture file is owned by this function and closed before it
/// returns, on every path.
async fn launch_and_wait(record: &mut JobRecord) -> ProcessExit {
    if let Err(e) = tokio::fs::create_dir_all(record.traces_dir()).await {
        warn!(job_id = record.id, error = %e, "Failed to create scratch directory");
        return ProcessExit::launch_failed(format!("scratch directory: {}", e));
    }

    let program = match record.spec.program() {
        Some(program) => program.to_string(),
        None => {
            warn!(job_id = record.id, "Job has an empty command");
            return ProcessExit::launch_failed("empty command");
        }
    };

    let stdout = match tokio::fs::File::create(record.stdout_path()).await {
        Ok(file) => file.into_std().await,
        Err(e) => {
            warn!(job_id = record.id, error = %e, "Failed to open stdout capture");
            return ProcessExit::launch_failed(format!("stdout capture: {}", e));
        }
    };
    let stderr = match stdout.try_clone() {
        Ok(file) => Stdio::from(file),
        Err(_) => Stdio::null(),
    };

    let mut cmd = Command::new(&program);
    cmd.args(record.spec.args())
        .current_dir(&record.working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(stderr);

    record.mark_running();

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!(job_id = record.id, program = %program, error = %e, "Failed to launch simulator");
            return ProcessExit::launch_failed(format!("launch {}: {}", program, e));
        }
    };
    drop(cmd);

    match child.wait().await {
        Ok(status) => ProcessExit::exited(status.code()),
        Err(e) => {
            warn!(job_id = record.id, error = %e, "Failed waiting for simulator");
            ProcessExit {
                launched: true,
                exit_code: None,
                error: Some(format!("wait: {}", e)),
            }
        }
    }
}
