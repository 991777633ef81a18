//! Error types for the pipeline driver.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop a pipeline run.
///
/// Per-item failures never appear here; they are collected in the stage reports.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Config file could not be parsed.
    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Scheduler error: {0}")]
    Batch(#[from] demtile_batch::BatchError),

    #[error("Tool error: {0}")]
    Tool(#[from] demtile_tools::ToolError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] demtile_fetch::FetchError),

    /// A fail-fast stage had a failure, so later stages were not run.
    #[error("Stage '{stage}' aborted after {failed} failed item(s)")]
    StageAborted { stage: String, failed: usize },

    /// Another input of the same stage already produces this output file.
    #[error("{} would overwrite {}, already produced from {}", input.display(), output.display(), owner.display())]
    OutputCollision {
        input: PathBuf,
        output: PathBuf,
        owner: PathBuf,
    },

    /// Coverage summary could not be built or written.
    #[error("Summary error: {0}")]
    Summary(#[from] demtile_grid::GridError),

    #[error("Failed to write report: {0}")]
    Report(#[from] serde_json::Error),
}
