//! # demtile-archive
//!
//! Archive handling for the extract and compress stages.
//!
//! [`ArchiveExtractor::extract_and_flatten`] unpacks a `.zip` or `.gz` archive into
//! a scoped temporary directory, unpacks any archives found inside it one more
//! level down, and returns the files accepted by a predicate as an
//! [`ExtractedArchive`]. The temporary directories live exactly as long as that
//! value, so they are removed on every path out of the caller, including errors.
//!
//! [`gzip_file`] compresses one file next to a destination directory without ever
//! leaving a truncated `.gz` behind.

mod compress;
mod error;
mod extract;
mod kind;

pub use compress::gzip_file;
pub use error::ArchiveError;
pub use extract::{ArchiveExtractor, ExtractedArchive, DEFAULT_MAX_DEPTH};
pub use kind::ArchiveKind;

/// Result type for archive operations.
pub type Result<T> = std::result::Result<T, ArchiveError>;
