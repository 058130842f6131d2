//! Statistics extraction seam.
//!
//! After a simulator process exits, an extractor turns the raw traces in the
//! job's scratch directory into `*STATS*.txt` files under `<scratch>/traces/`.
//! The extractor is an external collaborator: the completion path only cares
//! whether it succeeded.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::ExtractionError;
use crate::scheduler::job::TRACES_DIR;

/// Produces STATS files for one finished run.
#[async_trait]
pub trait StatsExtractor: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Runs extraction against a job's scratch directory.
    ///
    /// # Errors
    ///
    /// Any error marks the run as invalid; it never stops the sweep.
    async fn extract(&self, scratch_dir: &Path) -> Result<(), ExtractionError>;
}

/// Extractor for simulators that write their STATS files themselves.
///
/// Fails only when the simulator left no traces directory behind, which is
/// what a crashed or unlaunchable run looks like.
#[derive(Debug, Clone, Default)]
pub struct NoopExtractor;

#[async_trait]
impl StatsExtractor for NoopExtractor {
    fn name(&self) -> &str {
        "noop"
    }

    async fn extract(&self, scratch_dir: &Path) -> Result<(), ExtractionError> {
        let traces = scratch_dir.join(TRACES_DIR);
        if tokio::fs::metadata(&traces).await.is_err() {
            return Err(ExtractionError::MissingTraces(traces));
        }
        Ok(())
    }
}

/// Runs an external program with the scratch directory as its only argument.
#[derive(Debug, Clone)]
pub struct CommandExtractor {
    program: PathBuf,
}

impl CommandExtractor {
    /// Creates an extractor invoking the given program.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Returns the program path.
    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[async_trait]
impl StatsExtractor for CommandExtractor {
    fn name(&self) -> &str {
        "command"
    }

    async fn extract(&self, scratch_dir: &Path) -> Result<(), ExtractionError> {
        debug!(
            program = %self.program.display(),
            scratch_dir = %scratch_dir.display(),
            "Running statistics extractor"
        );

        let status = Command::new(&self.program)
            .arg(scratch_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| ExtractionError::SpawnFailed {
                command: self.program.display().to_string(),
                reason: e.to_string(),
            })?;

        if !status.success() {
            return Err(ExtractionError::NonZeroExit {
                code: status.code(),
                scratch_dir: scratch_dir.to_path_buf(),
            });
        }

        Ok(())
    }
}
