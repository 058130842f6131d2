//! Completion path for finished jobs.
//!
//! Runs once per job after its process exits (or failed to start):
//!
//! 1. statistics extraction against the scratch directory
//! 2. relocation of `traces/*STATS*.txt` into the job's destination
//! 3. recursive removal of the scratch directory
//!
//! The steps are strictly ordered for one job. Capacity is released by the
//! pool only after `CompletionHandler::complete` returns.

use std::any::Any;
use std::io;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::FutureExt;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::ExtractionError;
use crate::extractor::StatsExtractor;

use super::context::SchedulerContext;
use super::job::{JobOutcome, JobRecord, JobState};

/// Marker a relocated statistics file must carry in its name.
pub const STATS_MARKER: &str = "STATS";

/// Extension a relocated statistics file must have.
pub const STATS_EXTENSION: &str = ".txt";

/// How a job's process ended, as seen by the launcher.
#[derive(Debug, Clone, Default)]
pub struct ProcessExit {
    /// Whether the process was started.
    pub launched: bool,
    /// Exit code, when the process exited normally.
    pub exit_code: Option<i32>,
    /// Why the process could not be started or awaited.
    pub error: Option<String>,
}

impl ProcessExit {
    /// A process that ran and exited.
    pub fn exited(exit_code: Option<i32>) -> Self {
        Self {
            launched: true,
            exit_code,
            error: None,
        }
    }

    /// A process that never started.
    pub fn launch_failed(error: impl Into<String>) -> Self {
        Self {
            launched: false,
            exit_code: None,
            error: Some(error.into()),
        }
    }
}

/// Converts a finished job's raw output into permanent artifacts.
#[derive(Clone)]
pub struct CompletionHandler {
    extractor: Arc<dyn StatsExtractor>,
    context: Arc<SchedulerContext>,
}

impl CompletionHandler {
    /// Creates a handler using the given extractor and shared counters.
    pub fn new(extractor: Arc<dyn StatsExtractor>, context: Arc<SchedulerContext>) -> Self {
        Self { extractor, context }
    }

    /// Runs the full completion path for one job and returns its outcome.
    ///
    /// Never fails: every error is logged and recorded in the outcome.
    pub async fn complete(&self, job: &mut JobRecord, exit: ProcessExit) -> JobOutcome {
        let started = Instant::now();
        let mut errors = Vec::new();

        if let Some(ref e) = exit.error {
            errors.push(e.clone());
        }

        info!(job_id = job.id, scenario = %job.spec.scenario, "Collecting statistics");

        // Step 1: extraction. A panicking extractor counts as a failed one.
        let extraction = AssertUnwindSafe(self.extractor.extract(&job.working_dir))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(ExtractionError::Panicked(panic_message(&*payload))));

        let extraction_ok = match extraction {
            Ok(()) => true,
            Err(e) => {
                let invalid = self.context.record_invalid();
                warn!(
                    job_id = job.id,
                    extractor = self.extractor.name(),
                    error = %e,
                    invalid_runs = invalid,
                    "Statistics extraction failed"
                );
                errors.push(format!("extraction: {}", e));
                false
            }
        };

        // Step 2: relocation
        let (files_relocated, relocation_errors) =
            relocate_stats(&job.traces_dir(), job.dest_dir()).await;
        for e in relocation_errors {
            warn!(job_id = job.id, error = %e, "Failed to relocate statistics file");
            errors.push(format!("relocation: {}", e));
        }

        // Step 3: cleanup, regardless of the previous steps
        let scratch_removed = match remove_scratch(&job.working_dir).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    job_id = job.id,
                    working_dir = %job.working_dir.display(),
                    error = %e,
                    "Failed to remove scratch directory"
                );
                errors.push(format!("cleanup: {}", e));
                false
            }
        };

        job.state = if errors.is_empty() {
            JobState::Completed
        } else {
            JobState::Failed
        };

        debug!(
            job_id = job.id,
            files = files_relocated,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Completion path finished"
        );
        info!(job_id = job.id, state = %job.state, "Statistics collected");

        let elapsed = Utc::now() - job.admitted_at;

        JobOutcome {
            job_id: job.id,
            scenario: job.spec.scenario.clone(),
            run_index: job.spec.run_index,
            state: job.state,
            launched: exit.launched,
            exit_code: exit.exit_code,
            extraction_ok,
            files_relocated,
            scratch_removed,
            errors,
            finished_at: Utc::now(),
            duration_ms: elapsed.num_milliseconds().max(0) as u64,
        }
    }
}

/// Returns whether a file name matches `*STATS*.txt`.
///
/// The match is case-sensitive and, like a shell glob, skips dot files.
pub fn is_stats_file(name: &str) -> bool {
    if name.starts_with('.') {
        return false;
    }
    match name.strip_suffix(STATS_EXTENSION) {
        Some(stem) => stem.contains(STATS_MARKER),
        None => false,
    }
}

/// Moves every STATS file directly under `traces_dir` into `dest_dir`.
///
/// Returns the number of files moved and the errors hit along the way. A
/// missing `traces_dir` simply means there is nothing to move. `dest_dir` is
/// created if absent; concurrent creation by another job is fine.
pub async fn relocate_stats(traces_dir: &Path, dest_dir: &Path) -> (usize, Vec<io::Error>) {
    let mut errors = Vec::new();

    let candidates = match list_stats_files(traces_dir).await {
        Ok(files) => files,
        Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return (0, vec![e]),
    };

    if let Err(e) = fs::create_dir_all(dest_dir).await {
        errors.push(e);
        return (0, errors);
    }

    let mut moved = 0;
    for (path, name) in candidates {
        match move_file(&path, &dest_dir.join(&name)).await {
            Ok(()) => moved += 1,
            Err(e) => errors.push(e),
        }
    }

    (moved, errors)
}

async fn list_stats_files(dir: &Path) -> io::Result<Vec<(PathBuf, String)>> {
    let mut entries = fs::read_dir(dir).await?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        if !is_stats_file(&name) {
            continue;
        }
        if entry.file_type().await?.is_file() {
            files.push((entry.path(), name));
        }
    }

    files.sort();
    Ok(files)
}

/// Moves a file, falling back to copy and remove across filesystems.
async fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    fs::copy(from, to).await?;
    fs::remove_file(from).await
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

async fn remove_scratch(dir: &Path) -> io::Result<()> {
    match fs::remove_dir_all(dir).await {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::job::JobSpec;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;

    struct FixedExtractor {
        fail: bool,
        saw_scratch: AtomicBool,
    }

    impl FixedExtractor {
        fn new(fail: bool) -> Self {
            Self {
                fail,
                saw_scratch: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl StatsExtractor for FixedExtractor {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn extract(&self, scratch_dir: &Path) -> Result<(), ExtractionError> {
            self.saw_scratch.store(scratch_dir.exists(), Ordering::SeqCst);
            if self.fail {
                Err(ExtractionError::Failed("corrupt trace".to_string()))
            } else {
                Ok(())
            }
        }
    }

    struct PanickingExtractor;

    #[async_trait]
    impl StatsExtractor for PanickingExtractor {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn extract(&self, _scratch_dir: &Path) -> Result<(), ExtractionError> {
            panic!("trace parser blew up");
        }
    }

    fn job_in(temp: &TempDir, id: u64) -> JobRecord {
        let spec = JobSpec::simulation(
            "sim",
            "A",
            &[],
            0,
            temp.path().join("out/A/output_run0"),
        );
        let record = JobRecord::new(id, spec, temp.path().join(format!("tmp_folder_{}", id)));
        std::fs::create_dir_all(record.traces_dir()).unwrap();
        record
    }

    #[test]
    fn test_is_stats_file() {
        assert!(is_stats_file("consumer_STATS.txt"));
        assert!(is_stats_file("STATS.txt"));
        assert!(is_stats_file("run-STATS-0.txt"));
        assert!(!is_stats_file("consumer_stats.txt"));
        assert!(!is_stats_file("STATS.csv"));
        assert!(!is_stats_file("trace.txt"));
        assert!(!is_stats_file("a.txtSTATS"));
        assert!(!is_stats_file(".STATS.txt"));
    }

    #[tokio::test]
    async fn test_relocate_moves_only_matching_files() {
        let temp = TempDir::new().unwrap();
        let traces = temp.path().join("traces");
        let dest = temp.path().join("dest");
        std::fs::create_dir_all(&traces).unwrap();
        std::fs::write(traces.join("node0_STATS.txt"), "Ratio:0.5\n").unwrap();
        std::fs::write(traces.join("node1_STATS.txt"), "Ratio:0.7\n").unwrap();
        std::fs::write(traces.join("raw-trace.txt"), "noise").unwrap();

        let (moved, errors) = relocate_stats(&traces, &dest).await;

        assert_eq!(moved, 2);
        assert!(errors.is_empty());
        assert!(dest.join("node0_STATS.txt").exists());
        assert!(dest.join("node1_STATS.txt").exists());
        assert!(!dest.join("raw-trace.txt").exists());
        assert!(!traces.join("node0_STATS.txt").exists());
        assert!(traces.join("raw-trace.txt").exists());
    }

    #[tokio::test]
    async fn test_relocate_tolerates_existing_destination() {
        let temp = TempDir::new().unwrap();
        let traces = temp.path().join("traces");
        let dest = temp.path().join("dest");
        std::fs::create_dir_all(&traces).unwrap();
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(traces.join("STATS.txt"), "Ratio:1.0\n").unwrap();

        let (moved, errors) = relocate_stats(&traces, &dest).await;
        assert_eq!(moved, 1);
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn test_relocate_missing_traces_dir() {
        let temp = TempDir::new().unwrap();
        let (moved, errors) =
            relocate_stats(&temp.path().join("missing"), &temp.path().join("dest")).await;
        assert_eq!(moved, 0);
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn test_complete_success_removes_scratch() {
        let temp = TempDir::new().unwrap();
        let ctx = Arc::new(SchedulerContext::new());
        let extractor = Arc::new(FixedExtractor::new(false));
        let handler = CompletionHandler::new(extractor.clone(), Arc::clone(&ctx));

        let mut job = job_in(&temp, 0);
        std::fs::write(job.traces_dir().join("c_STATS.txt"), "Ratio:0.2\n").unwrap();

        let outcome = handler.complete(&mut job, ProcessExit::exited(Some(0))).await;

        assert!(outcome.is_success());
        assert!(outcome.extraction_ok);
        assert_eq!(outcome.files_relocated, 1);
        assert!(outcome.scratch_removed);
        assert!(!job.working_dir.exists());
        assert!(job.dest_dir().join("c_STATS.txt").exists());
        assert!(extractor.saw_scratch.load(Ordering::SeqCst));
        assert_eq!(ctx.invalid_count(), 0);
    }

    #[tokio::test]
    async fn test_complete_extraction_failure_still_cleans_up() {
        let temp = TempDir::new().unwrap();
        let ctx = Arc::new(SchedulerContext::new());
        let handler =
            CompletionHandler::new(Arc::new(FixedExtractor::new(true)), Arc::clone(&ctx));

        let mut job = job_in(&temp, 1);
        std::fs::write(job.traces_dir().join("c_STATS.txt"), "partial").unwrap();

        let outcome = handler.complete(&mut job, ProcessExit::exited(Some(0))).await;

        assert_eq!(outcome.state, JobState::Failed);
        assert!(!outcome.extraction_ok);
        assert_eq!(outcome.files_relocated, 1);
        assert!(outcome.scratch_removed);
        assert!(!job.working_dir.exists());
        assert_eq!(ctx.invalid_count(), 1);
    }

    #[tokio::test]
    async fn test_complete_extractor_panic_is_an_extraction_failure() {
        let temp = TempDir::new().unwrap();
        let ctx = Arc::new(SchedulerContext::new());
        let handler = CompletionHandler::new(Arc::new(PanickingExtractor), Arc::clone(&ctx));

        let mut job = job_in(&temp, 4);
        std::fs::write(job.traces_dir().join("c_STATS.txt"), "Ratio:0.3\n").unwrap();

        let outcome = handler.complete(&mut job, ProcessExit::exited(Some(0))).await;

        assert_eq!(outcome.state, JobState::Failed);
        assert!(!outcome.extraction_ok);
        assert!(outcome
            .errors
            .iter()
            .any(|e| e.contains("trace parser blew up")));
        assert_eq!(outcome.files_relocated, 1);
        assert!(outcome.scratch_removed);
        assert!(!job.working_dir.exists());
        assert_eq!(ctx.invalid_count(), 1);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(&*payload), "static message");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(&*payload), "owned message");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(&*payload), "unknown panic");
    }

    #[tokio::test]
    async fn test_complete_zero_matches_still_deletes_scratch() {
        let temp = TempDir::new().unwrap();
        let ctx = Arc::new(SchedulerContext::new());
        let handler =
            CompletionHandler::new(Arc::new(FixedExtractor::new(false)), Arc::clone(&ctx));

        let mut job = job_in(&temp, 2);
        std::fs::write(job.traces_dir().join("raw.log"), "x").unwrap();

        let outcome = handler.complete(&mut job, ProcessExit::exited(Some(3))).await;

        assert!(outcome.is_success());
        assert_eq!(outcome.files_relocated, 0);
        assert_eq!(outcome.exit_code, Some(3));
        assert!(!job.working_dir.exists());
    }

    #[tokio::test]
    async fn test_complete_launch_failure() {
        let temp = TempDir::new().unwrap();
        let ctx = Arc::new(SchedulerContext::new());
        let handler =
            CompletionHandler::new(Arc::new(FixedExtractor::new(false)), Arc::clone(&ctx));

        let mut job = job_in(&temp, 3);
        let outcome = handler
            .complete(&mut job, ProcessExit::launch_failed("No such file or directory"))
            .await;

        assert_eq!(outcome.state, JobState::Failed);
        assert!(!outcome.launched);
        assert!(outcome.errors[0].contains("No such file"));
        assert!(!job.working_dir.exists());
    }
}
