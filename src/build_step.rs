//! Pre-flight build of the simulator.
//!
//! The build command is invoked once, without arguments, before any job is
//! submitted. Its failure, or a simulator missing afterwards, is fatal.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::info;

use crate::error::BuildError;

/// Runs the build command and waits for it.
///
/// # Errors
///
/// Returns `BuildError` if the command cannot be started or exits non-zero.
pub async fn run_build(command: &Path) -> Result<(), BuildError> {
    if command.as_os_str().is_empty() {
        return Err(BuildError::EmptyCommand);
    }

    let shown = command.display().to_string();
    info!(command = %shown, "Building simulator");

    let status = Command::new(command)
        .stdin(Stdio::null())
        .status()
        .await
        .map_err(|source| BuildError::SpawnFailed {
            command: shown.clone(),
            source,
        })?;

    if !status.success() {
        return Err(BuildError::NonZeroExit {
            command: shown,
            code: status.code(),
        });
    }

    info!("Build finished");
    Ok(())
}

/// Resolves the simulator to an absolute path.
///
/// Jobs run with their scratch directory as working directory, so a relative
/// program path would not resolve there.
///
/// # Errors
///
/// Returns `BuildError::ExecutableMissing` if the file does not exist.
pub fn resolve_executable(path: &Path) -> Result<PathBuf, BuildError> {
    let resolved = std::fs::canonicalize(path)
        .map_err(|_| BuildError::ExecutableMissing(path.to_path_buf()))?;
    if !resolved.is_file() {
        return Err(BuildError::ExecutableMissing(path.to_path_buf()));
    }
    Ok(resolved)
}
