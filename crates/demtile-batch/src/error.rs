//! Error types for the batch crate.

use thiserror::Error;

/// Errors raised by the scheduler itself.
///
/// Handler failures are never reported through this type; they are recorded in the
/// [`BatchReport`](crate::BatchReport).
#[derive(Debug, Error)]
pub enum BatchError {
    /// Worker count must be at least one.
    #[error("Invalid worker count {0} (must be at least 1)")]
    InvalidWorkerCount(usize),

    /// A worker thread could not be spawned.
    #[error("Failed to start worker pool: {0}")]
    PoolStart(#[source] std::io::Error),
}
