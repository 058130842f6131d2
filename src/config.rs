//! Sweep configuration.
//!
//! Holds the knobs for one sweep run: where the simulator lives, how many
//! jobs may run at once, how many repeats each scenario gets, and where
//! scratch and permanent output go. Values come from defaults, then
//! `SIMSWEEP_*` environment variables, then CLI overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// Default number of concurrently running simulations.
pub const DEFAULT_CAPACITY: usize = 22;

/// Default number of repeated runs per scenario.
pub const DEFAULT_RUNS_PER_SCENARIO: u32 = 100;

/// Name of the ranked summary written into the output root.
pub const DEFAULT_SUMMARY_FILE: &str = "result.txt";

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration for a single sweep.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    // Simulator settings
    /// Path to the simulator executable.
    pub executable: PathBuf,
    /// Optional build command run once before any job is submitted.
    pub build_command: Option<PathBuf>,
    /// Optional external statistics extractor, invoked with the scratch dir.
    pub extractor_command: Option<PathBuf>,
    /// Directory holding the topology config files used by the preset sweep.
    pub topology_dir: PathBuf,

    // Scheduling settings
    /// Maximum number of jobs running at once.
    pub capacity: usize,
    /// Number of repeated runs per scenario.
    pub runs_per_scenario: u32,
    /// Delay applied before launching each of the first `capacity` jobs.
    pub startup_stagger: Duration,
    /// Delay after a process exits before its completion path runs.
    pub settle_delay: Duration,
    /// Pause between printing the sweep banner and the first submission.
    pub pre_run_pause: Duration,
    /// Interval at which drain progress is logged.
    pub drain_report_interval: Duration,

    // Storage settings
    /// Root of permanent per-scenario output.
    pub output_root: PathBuf,
    /// Root under which per-job scratch directories are created.
    pub scratch_root: PathBuf,
    /// File name of the ranked summary inside `output_root`.
    pub summary_file: String,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("build/brite_example"),
            build_command: None,
            extractor_command: None,
            topology_dir: PathBuf::from("brite_configs"),

            capacity: DEFAULT_CAPACITY,
            runs_per_scenario: DEFAULT_RUNS_PER_SCENARIO,
            startup_stagger: Duration::from_secs(15),
            settle_delay: Duration::from_millis(500),
            pre_run_pause: Duration::from_secs(5),
            drain_report_interval: Duration::from_secs(10),

            output_root: PathBuf::from("./output"),
            scratch_root: PathBuf::from("./ramdisk"),
            summary_file: DEFAULT_SUMMARY_FILE.to_string(),
        }
    }
}

impl SweepConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SIMSWEEP_EXECUTABLE`: Simulator path (default: build/brite_example)
    /// - `SIMSWEEP_BUILD_COMMAND`: Pre-flight build command (default: none)
    /// - `SIMSWEEP_EXTRACTOR`: External statistics extractor (default: none)
    /// - `SIMSWEEP_TOPOLOGY_DIR`: Topology config directory (default: brite_configs)
    /// - `SIMSWEEP_CAPACITY`: Concurrent jobs (default: 22)
    /// - `SIMSWEEP_RUNS`: Runs per scenario (default: 100)
    /// - `SIMSWEEP_STAGGER_SECS`: Startup stagger in seconds (default: 15)
    /// - `SIMSWEEP_SETTLE_MS`: Post-exit settle delay in milliseconds (default: 500)
    /// - `SIMSWEEP_PAUSE_SECS`: Pre-run pause in seconds (default: 5)
    /// - `SIMSWEEP_OUTPUT`: Output root (default: ./output)
    /// - `SIMSWEEP_SCRATCH`: Scratch root (default: ./ramdisk)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable has an invalid value or the
    /// resulting configuration fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("SIMSWEEP_EXECUTABLE") {
            config.executable = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("SIMSWEEP_BUILD_COMMAND") {
            config.build_command = non_empty_path(val);
        }

        if let Ok(val) = std::env::var("SIMSWEEP_EXTRACTOR") {
            config.extractor_command = non_empty_path(val);
        }

        if let Ok(val) = std::env::var("SIMSWEEP_TOPOLOGY_DIR") {
            config.topology_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("SIMSWEEP_CAPACITY") {
            config.capacity = parse_env_value(&val, "SIMSWEEP_CAPACITY")?;
        }

        if let Ok(val) = std::env::var("SIMSWEEP_RUNS") {
            config.runs_per_scenario = parse_env_value(&val, "SIMSWEEP_RUNS")?;
        }

        if let Ok(val) = std::env::var("SIMSWEEP_STAGGER_SECS") {
            let secs: u64 = parse_env_value(&val, "SIMSWEEP_STAGGER_SECS")?;
            config.startup_stagger = Duration::from_secs(secs);
        }

        if let Ok(val) = std::env::var("SIMSWEEP_SETTLE_MS") {
            let ms: u64 = parse_env_value(&val, "SIMSWEEP_SETTLE_MS")?;
            config.settle_delay = Duration::from_millis(ms);
        }

        if let Ok(val) = std::env::var("SIMSWEEP_PAUSE_SECS") {
            let secs: u64 = parse_env_value(&val, "SIMSWEEP_PAUSE_SECS")?;
            config.pre_run_pause = Duration::from_secs(secs);
        }

        if let Ok(val) = std::env::var("SIMSWEEP_OUTPUT") {
            config.output_root = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("SIMSWEEP_SCRATCH") {
            config.scratch_root = PathBuf::from(val);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ValidationFailed(
                "capacity must be greater than 0".to_string(),
            ));
        }

        if self.executable.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "executable cannot be empty".to_string(),
            ));
        }

        if self.summary_file.is_empty() || self.summary_file.contains('/') {
            return Err(ConfigError::ValidationFailed(format!(
                "summary_file must be a plain file name, got '{}'",
                self.summary_file
            )));
        }

        if self.output_root == self.scratch_root {
            return Err(ConfigError::ValidationFailed(
                "output_root and scratch_root must differ".to_string(),
            ));
        }

        Ok(())
    }

    /// Sets the simulator executable.
    pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = path.into();
        self
    }

    /// Sets the pre-flight build command.
    pub fn with_build_command(mut self, command: impl Into<PathBuf>) -> Self {
        self.build_command = Some(command.into());
        self
    }

    /// Sets the external statistics extractor.
    pub fn with_extractor_command(mut self, command: impl Into<PathBuf>) -> Self {
        self.extractor_command = Some(command.into());
        self
    }

    /// Sets the topology config directory.
    pub fn with_topology_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.topology_dir = dir.into();
        self
    }

    /// Sets the concurrency cap.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the number of runs per scenario.
    pub fn with_runs_per_scenario(mut self, runs: u32) -> Self {
        self.runs_per_scenario = runs;
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

    /// Sets the pre-run pause.
    pub fn with_pre_run_pause(mut self, pause: Duration) -> Self {
        self.pre_run_pause = pause;
        self
    }

    /// Sets the drain progress interval.
    pub fn with_drain_report_interval(mut self, interval: Duration) -> Self {
        self.drain_report_interval = interval;
        self
    }

    /// Sets the output root.
    pub fn with_output_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_root = dir.into();
        self
    }

    /// Sets the scratch root.
    pub fn with_scratch_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_root = dir.into();
        self
    }

    /// Path of the ranked summary file.
    pub fn summary_path(&self) -> PathBuf {
        self.output_root.join(&self.summary_file)
    }

    /// Permanent destination of one repeat of a scenario.
    pub fn run_output_dir(&self, scenario: &str, run_index: u32) -> PathBuf {
        self.output_root
            .join(scenario)
            .join(format!("output_run{}", run_index))
    }
}

/// Scratch directory naming shared by the config and the scheduler.
pub fn scratch_dir_for(scratch_root: &Path, job_id: u64) -> PathBuf {
    scratch_root.join(format!("tmp_folder_{}", job_id))
}

fn non_empty_path(val: String) -> Option<PathBuf> {
    if val.trim().is_empty() {
        None
    } else {
        Some(PathBuf::from(val))
    }
}

/// Parses an environment variable value into the specified type.
fn parse_env_value<T: std::str::FromStr>(val: &str, key: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    val.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}
