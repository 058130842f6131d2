//! Shared scheduler state.
//!
//! The only state shared between concurrently running jobs: capacity
//! accounting, the invalid-run counter and id allocation. Everything is an
//! atomic so completions never need a lock.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

use super::job::JobId;

/// Process-wide counters for one sweep.
#[derive(Debug, Default)]
pub struct SchedulerContext {
    active: AtomicUsize,
    peak_active: AtomicUsize,
    invalid: AtomicU64,
    next_id: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

impl SchedulerContext {
    /// Creates a context with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next job id. Ids are never reused.
    pub fn allocate_id(&self) -> JobId {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Records a job entering the running state.
    pub(crate) fn job_started(&self) -> usize {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_active.fetch_max(now, Ordering::SeqCst);
        now
    }

    /// Records a job leaving the running state after its completion path.
    pub(crate) fn job_finished(&self, success: bool) -> usize {
        if success {
            self.completed.fetch_add(1, Ordering::SeqCst);
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
        self.active.fetch_sub(1, Ordering::SeqCst) - 1
    }

    /// Records a failed statistics extraction.
    pub fn record_invalid(&self) -> u64 {
        self.invalid.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Number of jobs currently in flight.
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Number of runs whose statistics extraction failed.
    pub fn invalid_count(&self) -> u64 {
        self.invalid.load(Ordering::SeqCst)
    }

    /// Id the next admitted job will receive.
    pub fn next_id(&self) -> JobId {
        self.next_id.load(Ordering::SeqCst)
    }

    /// Snapshot of all counters.
    pub fn snapshot(&self) -> SchedulerStats {
        SchedulerStats {
            active: self.active.load(Ordering::SeqCst),
            peak_active: self.peak_active.load(Ordering::SeqCst),
            submitted: self.next_id.load(Ordering::SeqCst),
            completed: self.completed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            invalid_runs: self.invalid.load(Ordering::SeqCst),
        }
    }
}

/// Point-in-time view of the scheduler counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Jobs currently in flight.
    pub active: usize,
    /// Highest number of jobs ever in flight at once.
    pub peak_active: usize,
    /// Jobs admitted so far.
    pub submitted: u64,
    /// Jobs whose completion path finished without failure.
    pub completed: u64,
    /// Jobs that finished with a launch, extraction or relocation failure.
    pub failed: u64,
    /// Jobs whose statistics extraction failed.
    pub invalid_runs: u64,
}

impl SchedulerStats {
    /// Returns the number of jobs that went through the completion path.
    pub fn total_finished(&self) -> u64 {
        self.completed + self.failed
    }
}
