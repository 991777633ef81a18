//! Error types for external tool invocation.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from running an external tool.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The program is not on `PATH` and not an existing file.
    #[error("Tool not found: {program}")]
    NotFound {
        program: String,
        #[source]
        source: which::Error,
    },

    /// The process could not be started.
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The tool ran and exited unsuccessfully.
    #[error("{command} failed ({}): {stderr}", exit_code_text(.code))]
    InvocationFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The tool reported success but its output file is missing or empty.
    #[error("Expected output was not produced: {}", .0.display())]
    MissingOutput(PathBuf),

    /// A path has no usable file name.
    #[error("Invalid input path: {}", .0.display())]
    InvalidPath(PathBuf),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Tool output could not be interpreted.
    #[error(transparent)]
    Grid(#[from] demtile_grid::GridError),
}

fn exit_code_text(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit status {}", code),
        None => "terminated by signal".to_string(),
    }
}
