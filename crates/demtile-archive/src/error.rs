//! Error types for archive handling.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// The file is not an archive kind this crate can open.
    #[error("Unsupported archive: {}", .0.display())]
    UnsupportedArchive(PathBuf),

    /// Extraction produced no files at all.
    #[error("Archive {} contains no files", .0.display())]
    EmptyArchive(PathBuf),

    /// Extraction produced files, but none passed the filter.
    #[error("Archive {} has {found} files but none match", archive.display())]
    NoMatchingEntries { archive: PathBuf, found: usize },

    /// An entry would be written outside the extraction directory.
    #[error("Archive {} has unsafe entry path {entry:?}", archive.display())]
    UnsafeEntryPath { archive: PathBuf, entry: String },
}
