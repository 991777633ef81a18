//! # demtile-batch
//!
//! Bounded-concurrency batch execution with per-job failure isolation.
//!
//! A batch is a list of [`Job`]s and a handler. The [`Scheduler`] runs the handler
//! for every job on a fixed pool of worker threads and folds each [`JobResult`]
//! into a [`BatchReport`] as it arrives:
//! - exactly `worker_count` jobs are in flight at most; the rest wait in a queue
//! - a failing (or panicking) handler is recorded as data and never stops other jobs
//! - `run` returns only after every job has produced exactly one result
//! - progress can be observed from any thread through [`BatchProgress`], and a
//!   [`ProgressCallback`] fires once per completed job
//!
//! Fail-fast mode is opt-in per batch: after the first failure, jobs not yet started
//! are recorded as skipped failures instead of being run.
//!
//! ## Example
//!
//! ```
//! use demtile_batch::run_batch;
//!
//! let report = run_batch(vec![1u32, 2, 3, 4], 2, |n| {
//!     if n % 2 == 0 { Ok(n) } else { Err(format!("{} is odd", n)) }
//! })?;
//!
//! assert_eq!(report.total, 4);
//! assert_eq!(report.succeeded, 2);
//! assert_eq!(report.failed.len(), 2);
//! # Ok::<(), demtile_batch::BatchError>(())
//! ```

mod error;
mod job;
mod progress;
mod report;
mod scheduler;

pub use error::BatchError;
pub use job::{Job, JobId, JobLabel, JobResult, Outcome};
pub use progress::{BatchProgress, ProgressCallback, ProgressSnapshot};
pub use report::{BatchReport, FailedItem};
pub use scheduler::{run_batch, BatchConfig, BatchRun, Scheduler, SKIPPED_REASON};

/// Result type for scheduler operations.
pub type Result<T> = std::result::Result<T, BatchError>;
