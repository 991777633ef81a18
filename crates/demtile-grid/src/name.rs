//! File naming for split tiles.
//!
//! The split stage writes each window as `{ulx}_{uly}_{lrx}_{lry}_{source}`. Later
//! stages only change the extension (and append `.gz`), so the window can always
//! be recovered from an output file name without opening the file.

use crate::{GridError, Result, Window};
use std::fmt;
use std::str::FromStr;

/// A tile file name: the window it covers plus the name of the raster it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileName {
    /// Window encoded in the name.
    pub window: Window,
    /// Remainder of the name (source file name, possibly with a changed extension).
    pub source: String,
}

impl TileName {
    /// Create a tile name.
    pub fn new(window: Window, source: impl Into<String>) -> Self {
        Self {
            window,
            source: source.into(),
        }
    }

    /// Parse a file name like `10_55_15_50_srtm_38_01.tif`.
    pub fn parse(file_name: &str) -> Result<Self> {
        let invalid = || GridError::InvalidTileName(file_name.to_string());

        let mut parts = file_name.splitn(5, '_');
        let mut edge = || -> Result<i64> {
            parts
                .next()
                .and_then(|s| s.parse::<i64>().ok())
                .ok_or_else(invalid)
        };
        let window = Window::new(edge()?, edge()?, edge()?, edge()?);

        let source = parts.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;

        Ok(Self::new(window, source))
    }
}

impl fmt::Display for TileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let w = &self.window;
        write!(f, "{}_{}_{}_{}_{}", w.ulx, w.uly, w.lrx, w.lry, self.source)
    }
}

impl FromStr for TileName {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
