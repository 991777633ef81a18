//! Progress tracking shared between the scheduler and observers.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Callback fired once per completed job with the batch name and a snapshot.
///
/// Runs on the aggregating thread, never on a worker.
pub type ProgressCallback = Box<dyn Fn(&str, &ProgressSnapshot) + Send + Sync>;

/// Point-in-time view of a batch's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressSnapshot {
    /// Jobs with a recorded result.
    pub completed: usize,
    /// Completed jobs that failed.
    pub failed: usize,
    /// Jobs in the batch.
    pub total: usize,
}

impl ProgressSnapshot {
    /// Percentage of jobs completed; an empty batch counts as complete.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.completed as f64 * 100.0 / self.total as f64
        }
    }

    /// True when every job has a result.
    pub fn is_done(&self) -> bool {
        self.completed >= self.total
    }
}

/// Lock-free progress counters.
///
/// Readers on other threads call [`snapshot`](Self::snapshot) without blocking the
/// workers.
#[derive(Debug, Default)]
pub struct BatchProgress {
    total: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
}

impl BatchProgress {
    /// Create counters for a batch of `total` jobs.
    pub fn new(total: usize) -> Self {
        Self {
            total: AtomicUsize::new(total),
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }

    /// Reset the counters for a new batch.
    pub(crate) fn reset(&self, total: usize) {
        self.total.store(total, Ordering::Relaxed);
        self.completed.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
    }

    /// Count one completed job and return the updated snapshot.
    pub(crate) fn record(&self, success: bool) -> ProgressSnapshot {
        if !success {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.completed.fetch_add(1, Ordering::Release);
        self.snapshot()
    }

    /// Current progress.
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            completed: self.completed.load(Ordering::Acquire),
            failed: self.failed.load(Ordering::Relaxed),
            total: self.total.load(Ordering::Relaxed),
        }
    }
}
