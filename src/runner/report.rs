//! Report of a finished sweep.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::RankedSummary;
use crate::scheduler::{JobOutcome, SchedulerStats};

/// Everything a sweep produced, apart from the files on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    /// When the sweep started (before the build step).
    pub started_at: DateTime<Utc>,
    /// When the ranked summary was written.
    pub finished_at: DateTime<Utc>,
    /// Number of distinct scenarios.
    pub scenarios: usize,
    /// Final scheduler counters.
    pub stats: SchedulerStats,
    /// Outcomes of jobs that did not complete cleanly.
    pub failures: Vec<JobOutcome>,
    /// Where the ranked summary was written.
    pub summary_path: PathBuf,
    /// The ranked summary.
    pub summary: RankedSummary,
}

impl SweepReport {
    /// Number of runs whose statistics extraction failed.
    pub fn invalid_runs(&self) -> u64 {
        self.stats.invalid_runs
    }

    /// Wall time of the whole sweep.
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Keeps only outcomes worth reporting.
pub(crate) fn failed_outcomes(outcomes: Vec<JobOutcome>) -> Vec<JobOutcome> {
    outcomes.into_iter().filter(|o| !o.is_success()).collect()
}
