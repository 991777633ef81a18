//! Fixed-size worker pool that drains a batch of jobs.
//!
//! ## Threading
//!
//! The calling thread fills an unbounded job queue and then becomes the single
//! writer of the [`BatchReport`]: workers send each [`JobResult`] back over a
//! channel and never touch the report themselves. Workers are scoped threads, so
//! handlers may borrow from the caller and no thread outlives [`Scheduler::run`].

use crate::{
    BatchError, BatchProgress, BatchReport, Job, JobId, JobLabel, JobResult, Outcome,
    ProgressCallback, Result,
};
use crossbeam_channel::{Receiver, Sender};
use demtile_metrics::{metric_defs, StageLabels};
use std::any::Any;
use std::fmt::{self, Display};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Failure reason recorded for jobs that never ran because fail-fast aborted the batch.
pub const SKIPPED_REASON: &str = "skipped: batch aborted after an earlier failure";

/// Failure reason for a job whose worker died without reporting.
const LOST_REASON: &str = "worker exited before reporting a result";

/// Scheduler configuration for one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    /// Maximum number of jobs in flight.
    pub worker_count: usize,
    /// Stop dispatching new jobs after the first failure.
    pub fail_fast: bool,
}

impl BatchConfig {
    /// Create a collect-all configuration with `worker_count` workers.
    pub fn new(worker_count: usize) -> Result<Self> {
        let config = Self {
            worker_count,
            fail_fast: false,
        };
        config.validate()?;
        Ok(config)
    }

    /// Enable or disable fail-fast mode.
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Reject configurations the pool cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(BatchError::InvalidWorkerCount(self.worker_count));
        }
        Ok(())
    }
}

/// Everything a finished batch produced.
#[derive(Debug)]
pub struct BatchRun<O> {
    /// Aggregate counts and failures.
    pub report: BatchReport,
    /// Values returned by successful handlers, ordered by job id.
    pub outputs: Vec<(JobId, O)>,
}

impl<O> BatchRun<O> {
    /// Drop the job ids and keep the successful values.
    pub fn into_outputs(self) -> Vec<O> {
        self.outputs.into_iter().map(|(_, o)| o).collect()
    }
}

/// A job on its way to a worker, tagged with its position in the batch.
struct Dispatched<T> {
    index: usize,
    job: Job<T>,
}

/// A result on its way back to the aggregator.
struct Completed<O> {
    index: usize,
    skipped: bool,
    result: JobResult<O>,
}

/// Runs batches on a bounded pool of worker threads.
pub struct Scheduler {
    config: BatchConfig,
    name: String,
    progress: Arc<BatchProgress>,
    callback: Option<ProgressCallback>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .field("name", &self.name)
            .field("progress", &self.progress.snapshot())
            .finish()
    }
}

impl Scheduler {
    /// Create a scheduler. The configuration is validated when a batch runs.
    pub fn new(config: BatchConfig) -> Self {
        Self {
            config,
            name: "batch".to_string(),
            progress: Arc::new(BatchProgress::default()),
            callback: None,
        }
    }

    /// Name used for worker threads, logs and metric labels.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Call `callback` once per completed job.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Shared progress counters, readable from any thread while a batch runs.
    pub fn progress(&self) -> Arc<BatchProgress> {
        Arc::clone(&self.progress)
    }

    /// Batch name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configuration in use.
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Run `handler` over every job and collect the results.
    ///
    /// Returns once each job has exactly one result. Handler errors and panics are
    /// recorded in the report; only an invalid configuration or a failure to spawn
    /// the worker threads is returned as an error.
    pub fn run<T, O, E, F>(&self, jobs: Vec<Job<T>>, handler: F) -> Result<BatchRun<O>>
    where
        T: Send,
        O: Send,
        E: Display,
        F: Fn(T) -> std::result::Result<O, E> + Sync,
    {
        self.config.validate()?;

        let total = jobs.len();
        let labels = StageLabels::new(&self.name).to_labels();
        self.progress.reset(total);
        metrics::counter!(metric_defs::JOBS_SUBMITTED.name, &labels).increment(total as u64);

        let mut report = BatchReport::new(total);
        let mut outputs = Vec::with_capacity(total);
        if total == 0 {
            debug!("[{}] empty batch, nothing to run", self.name);
            return Ok(BatchRun { report, outputs });
        }

        let started = Instant::now();
        let meta: Vec<(JobId, String)> = jobs.iter().map(|j| (j.id, j.label.clone())).collect();
        let mut seen = vec![false; total];
        let abort = AtomicBool::new(false);
        let workers = self.config.worker_count.min(total);

        debug!(
            "[{}] dispatching {} jobs to {} workers (fail_fast={})",
            self.name, total, workers, self.config.fail_fast
        );

        thread::scope(|scope| -> Result<()> {
            let (job_tx, job_rx) = crossbeam_channel::unbounded::<Dispatched<T>>();
            let (result_tx, result_rx) = crossbeam_channel::unbounded::<Completed<O>>();

            let mut handles = Vec::with_capacity(workers);
            for worker in 0..workers {
                let ctx = WorkerContext {
                    jobs: job_rx.clone(),
                    results: result_tx.clone(),
                    handler: &handler,
                    abort: &abort,
                    fail_fast: self.config.fail_fast,
                    labels: labels.clone(),
                };
                let handle = thread::Builder::new()
                    .name(format!("{}-worker-{}", self.name, worker))
                    .spawn_scoped(scope, move || ctx.run())
                    .map_err(BatchError::PoolStart)?;
                handles.push(handle);
            }
            drop(job_rx);
            drop(result_tx);

            for (index, job) in jobs.into_iter().enumerate() {
                if job_tx.send(Dispatched { index, job }).is_err() {
                    break;
                }
            }
            drop(job_tx);

            for completed in result_rx.iter() {
                seen[completed.index] = true;
                self.record(&mut report, &mut outputs, completed, &labels);
            }

            for handle in handles {
                if handle.join().is_err() {
                    warn!("[{}] worker thread panicked outside a job handler", self.name);
                }
            }
            Ok(())
        })?;

        for (index, (job_id, label)) in meta.into_iter().enumerate() {
            if !seen[index] {
                let lost = Completed {
                    index,
                    skipped: false,
                    result: JobResult {
                        job_id,
                        label,
                        outcome: Outcome::Failure(LOST_REASON.to_string()),
                        duration: Duration::ZERO,
                    },
                };
                self.record(&mut report, &mut outputs, lost, &labels);
            }
        }

        outputs.sort_by_key(|(id, _)| *id);
        report.elapsed = started.elapsed();

        info!(
            "[{}] finished {} jobs in {:.2}s: {} succeeded, {} failed ({} skipped)",
            self.name,
            report.total,
            report.elapsed.as_secs_f64(),
            report.succeeded,
            report.failed.len(),
            report.skipped
        );

        Ok(BatchRun { report, outputs })
    }

    /// Fold one result into the report, counters and progress observers.
    fn record<O>(
        &self,
        report: &mut BatchReport,
        outputs: &mut Vec<(JobId, O)>,
        completed: Completed<O>,
        labels: &[(&'static str, String)],
    ) {
        let Completed {
            skipped, result, ..
        } = completed;

        report.record(&result);
        if skipped {
            report.skipped += 1;
        }

        let success = result.outcome.is_success();
        if success {
            metrics::counter!(metric_defs::JOBS_SUCCEEDED.name, labels).increment(1);
        } else {
            metrics::counter!(metric_defs::JOBS_FAILED.name, labels).increment(1);
        }

        let snapshot = self.progress.record(success);
        if let Some(callback) = &self.callback {
            callback(&self.name, &snapshot);
        }

        match result.outcome {
            Outcome::Success(value) => outputs.push((result.job_id, value)),
            Outcome::Failure(reason) if !skipped => {
                warn!("[{}] {} failed: {}", self.name, result.label, reason);
            }
            Outcome::Failure(_) => {}
        }
    }
}

/// Everything one worker thread needs.
struct WorkerContext<'a, T, O, F> {
    jobs: Receiver<Dispatched<T>>,
    results: Sender<Completed<O>>,
    handler: &'a F,
    abort: &'a AtomicBool,
    fail_fast: bool,
    labels: Vec<(&'static str, String)>,
}

impl<T, O, E, F> WorkerContext<'_, T, O, F>
where
    E: Display,
    F: Fn(T) -> std::result::Result<O, E>,
{
    /// Take jobs until the queue is drained.
    fn run(self) {
        for Dispatched { index, job } in self.jobs.iter() {
            let Job { id, label, payload } = job;

            if self.abort.load(Ordering::Acquire) {
                let skipped = Completed {
                    index,
                    skipped: true,
                    result: JobResult {
                        job_id: id,
                        label,
                        outcome: Outcome::Failure(SKIPPED_REASON.to_string()),
                        duration: Duration::ZERO,
                    },
                };
                if self.results.send(skipped).is_err() {
                    break;
                }
                continue;
            }

            metrics::gauge!(metric_defs::WORKERS_BUSY.name, &self.labels).increment(1.0);
            let started = Instant::now();
            let outcome = match panic::catch_unwind(AssertUnwindSafe(|| (self.handler)(payload))) {
                Ok(Ok(value)) => Outcome::Success(value),
                Ok(Err(e)) => Outcome::Failure(e.to_string()),
                Err(payload) => Outcome::Failure(format!("handler panicked: {}", panic_message(payload.as_ref()))),
            };
            let duration = started.elapsed();
            metrics::gauge!(metric_defs::WORKERS_BUSY.name, &self.labels).decrement(1.0);
            metrics::histogram!(metric_defs::JOB_DURATION.name, &self.labels)
                .record(duration.as_secs_f64() * 1000.0);

            if self.fail_fast && !outcome.is_success() {
                self.abort.store(true, Ordering::Release);
            }

            let completed = Completed {
                index,
                skipped: false,
                result: JobResult {
                    job_id: id,
                    label,
                    outcome,
                    duration,
                },
            };
            if self.results.send(completed).is_err() {
                break;
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Run `handler` over `items` with `worker_count` workers and report the outcome.
///
/// Items are labelled in the report through [`JobLabel`].
pub fn run_batch<I, O, E, F>(items: Vec<I>, worker_count: usize, handler: F) -> Result<BatchReport>
where
    I: JobLabel + Send,
    O: Send,
    E: Display,
    F: Fn(I) -> std::result::Result<O, E> + Sync,
{
    let scheduler = Scheduler::new(BatchConfig::new(worker_count)?);
    Ok(scheduler.run(Job::from_items(items), handler)?.report)
}
