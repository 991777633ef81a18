//! # demtile-tools
//!
//! Synchronous invocation of external command-line tools.
//!
//! Everything that shells out goes through the [`ToolRunner`] trait so that the
//! pipeline can be driven by a fake runner in tests. [`SystemRunner`] is the real
//! implementation on top of `std::process`. [`invoke`] adds the policy shared by
//! every caller: a non-zero exit becomes [`ToolError::InvocationFailed`] with the
//! tool's stderr as the reason.
//!
//! [`Gdal`] builds the `gdalinfo` / `gdal_translate` command lines the pipeline
//! needs and checks that each produced file actually exists afterwards.

mod command;
mod error;
mod gdal;

pub use command::{invoke, locate, SystemRunner, ToolCommand, ToolOutput, ToolRunner};
pub use error::ToolError;
pub use gdal::{netcdf_name, Gdal};

/// Result type for tool operations.
pub type Result<T> = std::result::Result<T, ToolError>;
