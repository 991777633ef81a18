//! # demtile-grid
//!
//! Coordinate grid planning for raster elevation tiles.
//!
//! This crate knows nothing about raster formats. It works purely on the corner
//! coordinates a metadata probe reports for a file:
//! - [`parse_corner_metadata`] pulls the `Upper Left` / `Lower Right` corner pair
//!   out of `gdalinfo`-style text into a [`BoundingBox`]
//! - [`plan_tiles`] cuts a bounding box into a deterministic, row-major grid of
//!   step-sized [`Window`]s
//! - [`TileName`] encodes a window into the file names the split stage writes and
//!   recovers it again downstream
//! - [`CoverageIndex`] builds the `summary.json` coverage listing from those names
//!
//! ## Example
//!
//! ```
//! use demtile_grid::{plan_tiles, BoundingBox, Point};
//!
//! let bbox = BoundingBox::new(Point::new(10.0, 60.0), Point::new(20.0, 50.0))?;
//! let windows = plan_tiles(&bbox, 5)?;
//! assert_eq!(windows.len(), 4);
//! # Ok::<(), demtile_grid::GridError>(())
//! ```

mod bbox;
mod coverage;
mod error;
mod name;
mod plan;

pub use bbox::{parse_corner_metadata, BoundingBox, Point};
pub use coverage::{CoverageEntry, CoverageIndex, SUMMARY_FILE_NAME};
pub use error::GridError;
pub use name::TileName;
pub use plan::{plan_tiles, plan_tiles_for_file, Tile, Window, MAX_COORDINATE, MAX_TILES};

/// Result type for grid operations.
pub type Result<T> = std::result::Result<T, GridError>;
