//! Error types for the grid crate.

use thiserror::Error;

/// Errors that can occur while planning tiles or parsing their metadata.
#[derive(Debug, Error)]
pub enum GridError {
    /// Corner coordinates do not describe a north-up raster.
    #[error("Invalid bounding box: upper left ({ulx}, {uly}), lower right ({lrx}, {lry})")]
    InvalidBoundingBox {
        /// Upper-left x.
        ulx: f64,
        /// Upper-left y.
        uly: f64,
        /// Lower-right x.
        lrx: f64,
        /// Lower-right y.
        lry: f64,
    },

    /// Step size must be positive.
    #[error("Invalid step size {0} (must be greater than zero)")]
    InvalidStep(u32),

    /// The grid for a bounding box is too large to plan in one go.
    #[error("Grid of {columns}x{rows} tiles exceeds the limit of {limit} tiles")]
    TooManyTiles {
        /// Windows per row.
        columns: u64,
        /// Windows per column.
        rows: u64,
        /// Largest grid accepted.
        limit: u64,
    },

    /// Metadata text is missing a corner marker or holds an unparsable coordinate.
    #[error("Unable to parse corner metadata: {0}")]
    MetadataParse(String),

    /// File name does not follow the `{ulx}_{uly}_{lrx}_{lry}_{source}` convention.
    #[error("Invalid tile file name: {0}")]
    InvalidTileName(String),

    /// I/O error reading or writing a coverage summary.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Coverage summary could not be (de)serialized.
    #[error("Summary JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
