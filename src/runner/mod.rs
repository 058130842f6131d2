//! End-to-end sweep execution.
//!
//! # Architecture
//!
//! ```text
//! build ─► ScenarioSet ─► JobScheduler ─► CompletionHandler (per job) ─► drain ─► ResultAggregator
//! ```
//!
//! The runner:
//! 1. Runs the optional build command and resolves the simulator path
//! 2. Checks that the output root is writable
//! 3. Submits one job per (scenario, repeat) pair, in scenario order
//! 4. Waits for every job to finish its completion path
//! 5. Writes the ranked summary and returns a `SweepReport`

mod report;

pub use report::SweepReport;

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::aggregate::ResultAggregator;
use crate::build_step::{resolve_executable, run_build};
use crate::config::SweepConfig;
use crate::error::SweepError;
use crate::extractor::{CommandExtractor, NoopExtractor, StatsExtractor};
use crate::scheduler::{JobScheduler, JobSpec, SchedulerConfig};
use crate::sweep::ScenarioSet;

/// Runs one sweep from build to ranked summary.
pub struct SweepRunner {
    config: SweepConfig,
    extractor: Arc<dyn StatsExtractor>,
}

impl SweepRunner {
    /// Creates a runner; the extractor follows `config.extractor_command`.
    pub fn new(config: SweepConfig) -> Self {
        let extractor: Arc<dyn StatsExtractor> = match config.extractor_command {
            Some(ref program) => Arc::new(CommandExtractor::new(program)),
            None => Arc::new(NoopExtractor),
        };
        Self { config, extractor }
    }

    /// Replaces the statistics extractor.
    pub fn with_extractor(mut self, extractor: Arc<dyn StatsExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Runs every scenario and aggregates the results.
    ///
    /// # Errors
    ///
    /// Returns `SweepError` for fatal conditions only: invalid configuration,
    /// build failure, missing simulator, unwritable output root, or a summary
    /// that cannot be written. Per-job failures are reported in the result.
    pub async fn run(&self, scenarios: &ScenarioSet) -> Result<SweepReport, SweepError> {
        let started_at = Utc::now();
        self.config.validate()?;

        if let Some(ref build) = self.config.build_command {
            run_build(build).await?;
        }
        let executable = resolve_executable(&self.config.executable)?;
        ensure_writable(&self.config.output_root)?;

        info!(
            settings = scenarios.len(),
            runs_per_setting = self.config.runs_per_scenario,
            total_runs = scenarios.total_jobs(),
            capacity = self.config.capacity,
            "Sweep prepared"
        );
        if !self.config.pre_run_pause.is_zero() {
            tokio::time::sleep(self.config.pre_run_pause).await;
        }

        let mut scheduler = JobScheduler::new(
            SchedulerConfig::from(&self.config),
            Arc::clone(&self.extractor),
        )?;

        let executable = executable.display().to_string();
        for scenario in scenarios {
            info!(
                scenario = %scenario.name,
                runs = scenario.repeat_count,
                "Starting simulations"
            );
            for run in 0..scenario.repeat_count {
                let spec = JobSpec::simulation(
                    executable.as_str(),
                    scenario.name.as_str(),
                    &scenario.params,
                    run,
                    self.config.run_output_dir(&scenario.name, run),
                );
                scheduler.submit(spec).await?;
            }
        }

        let outcomes = scheduler.await_drain().await;
        let stats = scheduler.stats();

        let aggregator = ResultAggregator::new().with_summary_file(&self.config.summary_file);
        let summary_path = self.config.summary_path();
        let root = self.config.output_root.clone();
        let summary = tokio::task::spawn_blocking(move || aggregator.aggregate(&root))
            .await
            .map_err(|e| SweepError::TaskFailed(e.to_string()))??;

        info!(
            completed = stats.completed,
            failed = stats.failed,
            invalid_runs = stats.invalid_runs,
            "Sweep finished"
        );

        Ok(SweepReport {
            started_at,
            finished_at: Utc::now(),
            scenarios: scenarios.len(),
            stats,
            failures: report::failed_outcomes(outcomes),
            summary_path,
            summary,
        })
    }
}

/// Creates the output root and proves it accepts new files.
fn ensure_writable(root: &Path) -> Result<(), SweepError> {
    let not_writable = |source| SweepError::OutputNotWritable {
        path: root.to_path_buf(),
        source,
    };
    std::fs::create_dir_all(root).map_err(not_writable)?;
    tempfile::NamedTempFile::new_in(root).map_err(not_writable)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BuildError;
    use crate::sweep::{Axis, Sweep};
    use std::time::Duration;
    use tempfile::TempDir;

    fn quiet_config(temp: &TempDir) -> SweepConfig {
        SweepConfig::new()
            .with_output_root(temp.path().join("output"))
            .with_scratch_root(temp.path().join("ramdisk"))
            .with_capacity(2)
            .with_runs_per_scenario(2)
            .with_startup_stagger(Duration::ZERO)
            .with_settle_delay(Duration::ZERO)
            .with_pre_run_pause(Duration::ZERO)
            .with_drain_report_interval(Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_missing_executable_is_fatal() {
        let temp = TempDir::new().unwrap();
        let config = quiet_config(&temp).with_executable(temp.path().join("nope"));
        let scenarios = ScenarioSet::new();

        let err = SweepRunner::new(config).run(&scenarios).await.unwrap_err();
        assert!(matches!(
            err,
            SweepError::Build(BuildError::ExecutableMissing(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_build_is_fatal() {
        let temp = TempDir::new().unwrap();
        let config = quiet_config(&temp).with_build_command("false");

        let err = SweepRunner::new(config)
            .run(&ScenarioSet::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SweepError::Build(BuildError::NonZeroExit { .. })));
    }

    #[test]
    fn test_ensure_writable_creates_root() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("a/b/output");
        ensure_writable(&root).unwrap();
        assert!(root.is_dir());
        assert_eq!(std::fs::read_dir(&root).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runner_end_to_end() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let sim = temp.path().join("sim.sh");
        std::fs::write(
            &sim,
            "#!/bin/sh\ncase \"$1\" in\n  --level=high) r=0.9 ;;\n  *) r=0.1 ;;\nesac\necho \"Ratio:$r\" > traces/node_STATS.txt\n",
        )
        .unwrap();
        std::fs::set_permissions(&sim, std::fs::Permissions::from_mode(0o755)).unwrap();

        let sweep = Sweep::new()
            .with_axis(Axis::table(
                "Level",
                ["--level=low", "--level=high"],
                &[("level=low", "Low"), ("level=high", "High")],
            ))
            .unwrap();
        let scenarios = sweep.enumerate(2);

        let config = quiet_config(&temp).with_executable(&sim);
        let report = SweepRunner::new(config).run(&scenarios).await.unwrap();

        assert_eq!(report.scenarios, 2);
        assert_eq!(report.stats.submitted, 4);
        assert_eq!(report.stats.completed, 4);
        assert_eq!(report.invalid_runs(), 0);
        assert!(report.failures.is_empty());
        assert!(report.stats.peak_active <= 2);

        let labels: Vec<&str> = report
            .summary
            .entries
            .iter()
            .map(|e| e.label.as_str())
            .collect();
        assert_eq!(labels, vec!["AVG_RATIO:High", "AVG_RATIO:Low"]);

        let written = std::fs::read_to_string(&report.summary_path).unwrap();
        assert_eq!(written, "AVG_RATIO:High:0.9\nAVG_RATIO:Low:0.1\n");
        assert_eq!(
            std::fs::read_dir(temp.path().join("ramdisk")).unwrap().count(),
            0
        );
    }
}
