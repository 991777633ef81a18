//! Metrics infrastructure for the demtile pipeline.
//!
//! Every metric the pipeline records is declared here as a structured [`Metric`]
//! constant so that names are never spelled out twice. The crate re-exports the
//! `metrics` facade; nothing is recorded unless the embedding application installs
//! a recorder.
//!
//! # Example
//!
//! ```rust,ignore
//! use demtile_metrics::{metric_defs, describe_metrics, StageLabels};
//!
//! describe_metrics();
//!
//! let labels = StageLabels::new("convert").to_labels();
//! metrics::counter!(metric_defs::JOBS_SUCCEEDED.name, &labels).increment(1);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// The kind of metric (counter, gauge, or histogram).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A monotonically increasing counter.
    Counter,
    /// A gauge that can go up and down.
    Gauge,
    /// A histogram for recording distributions.
    Histogram,
}

impl MetricKind {
    /// Returns the kind as a lowercase string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metric declaration with its metadata.
///
/// ```rust
/// use demtile_metrics::{Metric, MetricKind};
/// use metrics::Unit;
///
/// const TILES_WRITTEN: Metric = Metric::counter("demtile.split.tiles_written")
///     .with_description("Tiles written by the split stage")
///     .with_unit(Unit::Count)
///     .with_labels(&["stage"]);
///
/// assert_eq!(TILES_WRITTEN.kind, MetricKind::Counter);
/// ```
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric name (e.g., "demtile.batch.jobs_failed").
    pub name: &'static str,
    /// The kind of metric.
    pub kind: MetricKind,
    /// Human-readable description of the metric.
    pub description: &'static str,
    /// The unit of measurement (optional).
    pub unit: Option<Unit>,
    /// Expected label keys for this metric.
    pub labels: &'static [&'static str],
}

impl Metric {
    /// Creates a new counter metric with the given name.
    pub const fn counter(name: &'static str) -> Self {
        Self::with_kind(name, MetricKind::Counter)
    }

    /// Creates a new gauge metric with the given name.
    pub const fn gauge(name: &'static str) -> Self {
        Self::with_kind(name, MetricKind::Gauge)
    }

    /// Creates a new histogram metric with the given name.
    pub const fn histogram(name: &'static str) -> Self {
        Self::with_kind(name, MetricKind::Histogram)
    }

    const fn with_kind(name: &'static str, kind: MetricKind) -> Self {
        Self {
            name,
            kind,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Sets the description for the metric.
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Sets the unit for the metric.
    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Sets the expected label keys for the metric.
    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Registers this metric's description with the metrics recorder.
    pub fn describe(&self) {
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => {
                describe_counter!(self.name, unit, self.description);
            }
            (MetricKind::Counter, None) => {
                describe_counter!(self.name, self.description);
            }
            (MetricKind::Gauge, Some(unit)) => {
                describe_gauge!(self.name, unit, self.description);
            }
            (MetricKind::Gauge, None) => {
                describe_gauge!(self.name, self.description);
            }
            (MetricKind::Histogram, Some(unit)) => {
                describe_histogram!(self.name, unit, self.description);
            }
            (MetricKind::Histogram, None) => {
                describe_histogram!(self.name, self.description);
            }
        }
    }
}

/// All metric definitions for the pipeline.
pub mod metric_defs {
    use super::{Metric, Unit};

    /// Labels present on every stage-scoped metric.
    pub const STAGE_LABELS: &[&str] = &["stage"];

    /// Labels present on tool invocation metrics.
    pub const TOOL_LABELS: &[&str] = &["program"];

    // ========================================================================
    // Batch Scheduler
    // ========================================================================

    /// Jobs handed to the scheduler.
    pub const JOBS_SUBMITTED: Metric = Metric::counter("demtile.batch.jobs_submitted")
        .with_description("Jobs submitted to a batch")
        .with_unit(Unit::Count)
        .with_labels(STAGE_LABELS);

    /// Jobs whose handler returned success.
    pub const JOBS_SUCCEEDED: Metric = Metric::counter("demtile.batch.jobs_succeeded")
        .with_description("Jobs that completed successfully")
        .with_unit(Unit::Count)
        .with_labels(STAGE_LABELS);

    /// Jobs recorded as failures, including skipped jobs in fail-fast mode.
    pub const JOBS_FAILED: Metric = Metric::counter("demtile.batch.jobs_failed")
        .with_description("Jobs recorded as failed")
        .with_unit(Unit::Count)
        .with_labels(STAGE_LABELS);

    /// Wall-clock duration of a single job.
    pub const JOB_DURATION: Metric = Metric::histogram("demtile.batch.job_duration_ms")
        .with_description("Wall-clock time spent in a job handler in milliseconds")
        .with_unit(Unit::Milliseconds)
        .with_labels(STAGE_LABELS);

    /// Workers currently executing a handler.
    pub const WORKERS_BUSY: Metric = Metric::gauge("demtile.batch.workers_busy")
        .with_description("Workers currently executing a job")
        .with_unit(Unit::Count)
        .with_labels(STAGE_LABELS);

    // ========================================================================
    // External Tools
    // ========================================================================

    /// External command invocations.
    pub const TOOL_INVOCATIONS: Metric = Metric::counter("demtile.tool.invocations")
        .with_description("External tool invocations")
        .with_unit(Unit::Count)
        .with_labels(TOOL_LABELS);

    /// External command invocations with a non-zero exit status.
    pub const TOOL_FAILURES: Metric = Metric::counter("demtile.tool.failures")
        .with_description("External tool invocations that exited unsuccessfully")
        .with_unit(Unit::Count)
        .with_labels(TOOL_LABELS);

    // ========================================================================
    // Archives and Compression
    // ========================================================================

    /// Files extracted from archives (all nesting levels).
    pub const ARCHIVE_ENTRIES_EXTRACTED: Metric = Metric::counter("demtile.archive.entries_extracted")
        .with_description("Files extracted from archives")
        .with_unit(Unit::Count);

    /// Bytes written by gzip compression.
    pub const BYTES_COMPRESSED: Metric = Metric::counter("demtile.archive.bytes_compressed")
        .with_description("Compressed bytes written")
        .with_unit(Unit::Bytes);

    // ========================================================================
    // Acquisition
    // ========================================================================

    /// Files downloaded over HTTP.
    pub const FILES_DOWNLOADED: Metric = Metric::counter("demtile.fetch.files_downloaded")
        .with_description("Files downloaded")
        .with_unit(Unit::Count);

    /// Bytes downloaded over HTTP.
    pub const BYTES_DOWNLOADED: Metric = Metric::counter("demtile.fetch.bytes_downloaded")
        .with_description("Bytes downloaded")
        .with_unit(Unit::Bytes);

    /// Returns a slice of all defined metrics.
    pub const ALL: &[&Metric] = &[
        &JOBS_SUBMITTED,
        &JOBS_SUCCEEDED,
        &JOBS_FAILED,
        &JOB_DURATION,
        &WORKERS_BUSY,
        &TOOL_INVOCATIONS,
        &TOOL_FAILURES,
        &ARCHIVE_ENTRIES_EXTRACTED,
        &BYTES_COMPRESSED,
        &FILES_DOWNLOADED,
        &BYTES_DOWNLOADED,
    ];
}

/// Labels identifying the pipeline stage a metric belongs to.
///
/// ```rust
/// use demtile_metrics::StageLabels;
///
/// let labels = StageLabels::new("split").with_pipeline("process");
/// assert_eq!(labels.to_labels().len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct StageLabels {
    /// Stage name (plan, split, convert, compress, extract, fetch).
    pub stage: String,
    /// Name of the pipeline the stage runs in, if any.
    pub pipeline: Option<String>,
}

impl StageLabels {
    /// Creates labels for the given stage.
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            pipeline: None,
        }
    }

    /// Attaches the enclosing pipeline name.
    pub fn with_pipeline(mut self, pipeline: impl Into<String>) -> Self {
        self.pipeline = Some(pipeline.into());
        self
    }

    /// Converts the labels to the metrics crate label format.
    pub fn to_labels(&self) -> Vec<(&'static str, String)> {
        let mut labels = vec![("stage", self.stage.clone())];
        if let Some(pipeline) = &self.pipeline {
            labels.push(("pipeline", pipeline.clone()));
        }
        labels
    }
}

/// Describes all metrics used by the pipeline.
///
/// Call once at startup, after installing a recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_labels_without_pipeline() {
        let labels = StageLabels::new("convert").to_labels();
        assert_eq!(labels, vec![("stage", "convert".to_string())]);
    }

    #[test]
    fn test_stage_labels_with_pipeline() {
        let labels = StageLabels::new("split").with_pipeline("process").to_labels();
        assert_eq!(labels.len(), 2);
        assert!(labels.contains(&("pipeline", "process".to_string())));
    }

    #[test]
    fn test_metric_definitions() {
        assert_eq!(metric_defs::JOBS_FAILED.name, "demtile.batch.jobs_failed");
        assert_eq!(metric_defs::JOBS_FAILED.kind, MetricKind::Counter);
        assert_eq!(metric_defs::JOB_DURATION.kind, MetricKind::Histogram);
        assert_eq!(metric_defs::JOB_DURATION.unit, Some(Unit::Milliseconds));
        assert_eq!(metric_defs::WORKERS_BUSY.kind, MetricKind::Gauge);
        assert_eq!(metric_defs::TOOL_FAILURES.labels, &["program"]);
    }

    #[test]
    fn test_all_metric_names_unique() {
        let mut names: Vec<_> = metric_defs::ALL.iter().map(|m| m.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), metric_defs::ALL.len());
    }

    #[test]
    fn test_metric_minimal() {
        const MINIMAL: Metric = Metric::gauge("minimal");

        assert_eq!(MINIMAL.kind, MetricKind::Gauge);
        assert_eq!(MINIMAL.description, "");
        assert_eq!(MINIMAL.unit, None);
        assert_eq!(MINIMAL.labels, &[] as &[&str]);
    }
}
