//! Error types for tile acquisition.

use thiserror::Error;

/// Errors that can occur while downloading source data.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered, but not with the file.
    #[error("Download of {url} failed: {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Zoom level outside 1..=14.
    #[error("Invalid zoom level: {0} (must be 1-14)")]
    InvalidZoomLevel(u8),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A coverage page had no download links.
    #[error("No download links found in {0}")]
    NoLinks(String),

    #[error("Link pattern error: {0}")]
    Pattern(#[from] regex::Error),
}
