//! Jobs and their results.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Identifier of a job within one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Human-readable name of a job input, used in failure listings.
pub trait JobLabel {
    /// Describe the input.
    fn job_label(&self) -> String;
}

impl JobLabel for PathBuf {
    fn job_label(&self) -> String {
        self.display().to_string()
    }
}

impl JobLabel for &Path {
    fn job_label(&self) -> String {
        self.display().to_string()
    }
}

impl JobLabel for String {
    fn job_label(&self) -> String {
        self.clone()
    }
}

impl JobLabel for &str {
    fn job_label(&self) -> String {
        (*self).to_string()
    }
}

macro_rules! impl_job_label_display {
    ($($t:ty),*) => {
        $(impl JobLabel for $t {
            fn job_label(&self) -> String {
                self.to_string()
            }
        })*
    };
}

impl_job_label_display!(u8, u16, u32, u64, usize, i32, i64);

/// A unit of work owned by the scheduler for its lifetime.
#[derive(Debug, Clone)]
pub struct Job<T> {
    /// Identifier, unique within the batch.
    pub id: JobId,
    /// What the job works on, as shown in reports.
    pub label: String,
    /// Data handed to the handler.
    pub payload: T,
}

impl<T> Job<T> {
    /// Create a job.
    pub fn new(id: JobId, label: impl Into<String>, payload: T) -> Self {
        Self {
            id,
            label: label.into(),
            payload,
        }
    }

    /// Wrap items as jobs numbered from zero, labelled by [`JobLabel`].
    pub fn from_items<I>(items: I) -> Vec<Job<T>>
    where
        I: IntoIterator<Item = T>,
        T: JobLabel,
    {
        Self::from_items_with(items, T::job_label)
    }

    /// Wrap items as jobs numbered from zero, labelled by `label`.
    pub fn from_items_with<I, F>(items: I, label: F) -> Vec<Job<T>>
    where
        I: IntoIterator<Item = T>,
        F: Fn(&T) -> String,
    {
        items
            .into_iter()
            .enumerate()
            .map(|(i, payload)| Job::new(JobId(i as u64), label(&payload), payload))
            .collect()
    }
}

/// What a handler produced for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<O> {
    /// The handler returned a value.
    Success(O),
    /// The handler failed, panicked, or was skipped; the reason is kept as text.
    Failure(String),
}

impl<O> Outcome<O> {
    /// True for [`Outcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}

/// The single result a job produces.
#[derive(Debug, Clone)]
pub struct JobResult<O> {
    /// Job that produced this result.
    pub job_id: JobId,
    /// Label of that job.
    pub label: String,
    /// Handler outcome.
    pub outcome: Outcome<O>,
    /// Time spent in the handler (zero for skipped jobs).
    pub duration: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_items_numbers_and_labels() {
        let jobs = Job::from_items(vec![PathBuf::from("a.tif"), PathBuf::from("b.tif")]);
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].id, JobId(0));
        assert_eq!(jobs[1].id, JobId(1));
        assert_eq!(jobs[1].label, "b.tif");
    }

    #[test]
    fn test_from_items_with_custom_label() {
        let jobs = Job::from_items_with(vec![(1, 2), (3, 4)], |(a, b)| format!("{}x{}", a, b));
        assert_eq!(jobs[1].label, "3x4");
    }

    #[test]
    fn test_job_id_display() {
        assert_eq!(JobId(7).to_string(), "job-7");
    }
}
