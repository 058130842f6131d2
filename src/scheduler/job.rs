//! Job definitions for the scheduler.
//!
//! This module defines the core job types used in the scheduling system:
//!
//! - `JobSpec`: What the caller submits (scenario, repeat index, command, destination)
//! - `JobRecord`: A submitted job with its id, scratch directory and lifecycle state
//! - `JobState`: Lifecycle state of a job
//! - `JobOutcome`: What the completion path reports once a job is done

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name of the subdirectory the simulator writes its traces into.
pub const TRACES_DIR: &str = "traces";

/// Identifier assigned to a job at admission time.
pub type JobId = u64;

/// Specification of one simulator run, as handed to the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobSpec {
    /// Scenario this run belongs to.
    pub scenario: String,
    /// Repeat index, passed to the simulator as its RNG run.
    pub run_index: u32,
    /// Full argument vector; the first element is the program.
    pub command: Vec<String>,
    /// Permanent location for the relocated STATS files.
    pub dest_dir: PathBuf,
}

impl JobSpec {
    /// Creates a job spec from an explicit argument vector.
    pub fn new(
        scenario: impl Into<String>,
        run_index: u32,
        command: Vec<String>,
        dest_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            scenario: scenario.into(),
            run_index,
            command,
            dest_dir: dest_dir.into(),
        }
    }

    /// Builds the simulator invocation for one repeat of a scenario:
    /// `<executable> <param>... --RngRun=<i> --outputFolder=traces`.
    pub fn simulation(
        executable: impl Into<String>,
        scenario: impl Into<String>,
        params: &[String],
        run_index: u32,
        dest_dir: impl Into<PathBuf>,
    ) -> Self {
        let mut command = Vec::with_capacity(params.len() + 3);
        command.push(executable.into());
        command.extend(params.iter().cloned());
        command.push(format!("--RngRun={}", run_index));
        command.push(format!("--outputFolder={}", TRACES_DIR));

        Self::new(scenario, run_index, command, dest_dir)
    }

    /// Returns the program to execute, if any.
    pub fn program(&self) -> Option<&str> {
        self.command.first().map(String::as_str)
    }

    /// Returns the arguments after the program.
    pub fn args(&self) -> &[String] {
        self.command.get(1..).unwrap_or(&[])
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    /// Admitted but its process has not been started yet.
    Pending,
    /// Its process has been started (or the start was attempted).
    Running,
    /// Completion path finished without a recorded failure.
    Completed,
    /// Launch, extraction or relocation failed; cleanup still ran.
    Failed,
}

impl JobState {
    /// Returns whether the job has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Pending => write!(f, "pending"),
            JobState::Running => write!(f, "running"),
            JobState::Completed => write!(f, "completed"),
            JobState::Failed => write!(f, "failed"),
        }
    }
}

/// A job owned by the scheduler.
///
/// The scratch directory (`working_dir`) belongs to exactly one record and
/// is removed once the record reaches a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// Monotonic id, also used to name the scratch directory.
    pub id: JobId,
    /// What to run.
    pub spec: JobSpec,
    /// Scratch directory the process runs in.
    pub working_dir: PathBuf,
    /// Current lifecycle state.
    pub state: JobState,
    /// When the job was admitted.
    pub admitted_at: DateTime<Utc>,
    /// When the process was started, if it was.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// Creates a pending record for an admitted job.
    pub fn new(id: JobId, spec: JobSpec, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            id,
            spec,
            working_dir: working_dir.into(),
            state: JobState::Pending,
            admitted_at: Utc::now(),
            started_at: None,
        }
    }

    /// Directory the simulator writes into.
    pub fn traces_dir(&self) -> PathBuf {
        self.working_dir.join(TRACES_DIR)
    }

    /// Where the process's stdout is captured while it runs.
    pub fn stdout_path(&self) -> PathBuf {
        self.working_dir.join(format!("t_{}.stdout.txt", self.id))
    }

    /// Permanent destination of this job's artifacts.
    pub fn dest_dir(&self) -> &PathBuf {
        &self.spec.dest_dir
    }

    /// Marks the process as started.
    pub fn mark_running(&mut self) {
        self.state = JobState::Running;
        self.started_at = Some(Utc::now());
    }
}

/// Result of a job's completion path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOutcome {
    /// Id of the job.
    pub job_id: JobId,
    /// Scenario the job belongs to.
    pub scenario: String,
    /// Repeat index.
    pub run_index: u32,
    /// Terminal state.
    pub state: JobState,
    /// Whether the process was started at all.
    pub launched: bool,
    /// Exit code of the process, when it exited normally.
    #[serde(default)]
    pub exit_code: Option<i32>,
    /// Whether statistics extraction succeeded.
    pub extraction_ok: bool,
    /// Number of STATS files moved into the destination.
    pub files_relocated: usize,
    /// Whether the scratch directory was removed.
    pub scratch_removed: bool,
    /// Failure messages collected along the completion path.
    #[serde(default)]
    pub errors: Vec<String>,
    /// When the completion path finished.
    pub finished_at: DateTime<Utc>,
    /// Wall time from admission to the end of the completion path, in milliseconds.
    pub duration_ms: u64,
}

impl JobOutcome {
    /// Returns whether the job completed without a recorded failure.
    pub fn is_success(&self) -> bool {
        self.state == JobState::Completed
    }
}
