//! Aggregate outcome of one batch.

use crate::{JobResult, Outcome};
use serde::Serialize;
use std::time::Duration;

/// An input that did not succeed, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedItem {
    /// Label of the failed job's input.
    pub input: String,
    /// Why it failed.
    pub reason: String,
}

/// Outcome counts for one batch, accumulated as results arrive.
///
/// `succeeded + failed.len() == total` once the batch has finished. The order of
/// `failed` follows completion order and carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Jobs submitted.
    pub total: usize,
    /// Jobs that succeeded.
    pub succeeded: usize,
    /// Every job that did not succeed.
    pub failed: Vec<FailedItem>,
    /// Failed jobs that never ran because fail-fast aborted the batch.
    pub skipped: usize,
    /// Wall-clock time from first dispatch to last result.
    pub elapsed: Duration,
}

impl BatchReport {
    /// Start an empty report for `total` jobs.
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Fold one job result into the report.
    pub fn record<O>(&mut self, result: &JobResult<O>) {
        match &result.outcome {
            Outcome::Success(_) => self.succeeded += 1,
            Outcome::Failure(reason) => self.failed.push(FailedItem {
                input: result.label.clone(),
                reason: reason.clone(),
            }),
        }
    }

    /// Jobs with a recorded result.
    pub fn completed(&self) -> usize {
        self.succeeded + self.failed.len()
    }

    /// True when nothing failed.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Add another report's counts to this one.
    pub fn merge(&mut self, other: &BatchReport) {
        self.total += other.total;
        self.succeeded += other.succeeded;
        self.failed.extend(other.failed.iter().cloned());
        self.skipped += other.skipped;
        self.elapsed += other.elapsed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JobId;

    fn result(id: u64, outcome: Outcome<()>) -> JobResult<()> {
        JobResult {
            job_id: JobId(id),
            label: format!("input-{}", id),
            outcome,
            duration: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_record() {
        let mut report = BatchReport::new(3);
        report.record(&result(0, Outcome::Success(())));
        report.record(&result(1, Outcome::Failure("exit status 1".into())));
        report.record(&result(2, Outcome::Success(())));

        assert_eq!(report.completed(), 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(
            report.failed,
            vec![FailedItem {
                input: "input-1".into(),
                reason: "exit status 1".into()
            }]
        );
        assert!(!report.is_clean());
    }

    #[test]
    fn test_merge() {
        let mut a = BatchReport::new(2);
        a.record(&result(0, Outcome::Success(())));
        a.record(&result(1, Outcome::Failure("boom".into())));

        let mut b = BatchReport::new(1);
        b.record(&result(0, Outcome::Success(())));

        a.merge(&b);
        assert_eq!(a.total, 3);
        assert_eq!(a.succeeded, 2);
        assert_eq!(a.failed.len(), 1);
    }

    #[test]
    fn test_empty_report_is_clean() {
        let report = BatchReport::new(0);
        assert_eq!(report.completed(), 0);
        assert!(report.is_clean());
    }
}
