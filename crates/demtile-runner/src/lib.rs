//! # demtile-runner
//!
//! Pipeline driver for the demtile tools.
//!
//! A [`Pipeline`] chains batch stages over directories of elevation rasters:
//! - `process`: plan → split → convert → compress, then `summary.json`
//! - `convert`: rasters straight to netCDF
//! - `extract`: rasters out of (nested) archives, then convert
//! - `fetch_*`: download source data from coverage pages, URL lists or
//!   Terrain Tiles
//!
//! Every stage is one [`demtile_batch::Scheduler`] run. Per-item failures land in
//! the stage's [`StageReport`]; the [`PipelineReport`] collects them all so the
//! run can be summarised at the end.

pub mod config;
mod error;
mod pipeline;
mod progress;
mod report;
pub mod stage;

pub use config::{FetchSettings, PipelineConfig, StageSettings, ToolSettings};
pub use error::RunnerError;
pub use pipeline::Pipeline;
pub use progress::{format_progress, ProgressLine};
pub use report::PipelineReport;
pub use stage::{scan_dir, StageDir, StageReport};

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, RunnerError>;
