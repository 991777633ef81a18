//! Coverage summary (`summary.json`) for a directory of processed tiles.
//!
//! The summary lets a consumer pick the file holding a coordinate without opening
//! any raster: each entry lists a file name and its `[min_lat, max_lat, min_lon,
//! max_lon]` extent, derived from the tile name.

use crate::{Result, TileName};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the coverage summary written next to the processed tiles.
pub const SUMMARY_FILE_NAME: &str = "summary.json";

/// One processed file and the extent it covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageEntry {
    /// File name relative to the summary's directory.
    pub file: String,
    /// `[min_lat, max_lat, min_lon, max_lon]`.
    pub coords: [f64; 4],
}

impl CoverageEntry {
    /// Build an entry from a tile file name.
    pub fn from_tile_name(name: &TileName) -> Self {
        let w = name.window;
        Self {
            file: name.to_string(),
            coords: [w.lry as f64, w.uly as f64, w.ulx as f64, w.lrx as f64],
        }
    }

    /// Check if the entry covers a coordinate (edges inclusive).
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        let [min_lat, max_lat, min_lon, max_lon] = self.coords;
        lat >= min_lat && lat <= max_lat && lon >= min_lon && lon <= max_lon
    }
}

/// All coverage entries for a directory, sorted by file name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverageIndex {
    entries: Vec<CoverageEntry>,
}

impl CoverageIndex {
    /// Build an index from entries.
    pub fn new(mut entries: Vec<CoverageEntry>) -> Self {
        entries.sort_by(|a, b| a.file.cmp(&b.file));
        Self { entries }
    }

    /// Index every file in `dir` whose name parses as a tile name.
    ///
    /// Files that are not tiles (including an existing summary) are skipped.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let mut entries = Vec::new();

        for entry in fs::read_dir(dir.as_ref())? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if file_name == SUMMARY_FILE_NAME {
                continue;
            }

            match TileName::parse(file_name) {
                Ok(name) => entries.push(CoverageEntry::from_tile_name(&name)),
                Err(_) => tracing::debug!("Skipping non-tile file {} in coverage summary", file_name),
            }
        }

        Ok(Self::new(entries))
    }

    /// Entries in file-name order.
    pub fn entries(&self) -> &[CoverageEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry covering the coordinate.
    pub fn find(&self, lat: f64, lon: f64) -> Option<&CoverageEntry> {
        self.entries.iter().find(|e| e.contains(lat, lon))
    }

    /// Write `summary.json` into `dir`, returning its path.
    pub fn write_json<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        let path = dir.as_ref().join(SUMMARY_FILE_NAME);
        let data = serde_json::to_vec_pretty(&self.entries)?;
        fs::write(&path, data)?;
        Ok(path)
    }

    /// Read a summary file.
    pub fn read_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = fs::File::open(path.as_ref())?;
        let entries: Vec<CoverageEntry> = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(Self::new(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Window;

    #[test]
    fn test_entry_coords_from_name() {
        let name = TileName::new(Window::new(10, 55, 15, 50), "srtm_38_01.nc.gz");
        let entry = CoverageEntry::from_tile_name(&name);
        assert_eq!(entry.file, "10_55_15_50_srtm_38_01.nc.gz");
        assert_eq!(entry.coords, [50.0, 55.0, 10.0, 15.0]);
        assert!(entry.contains(52.5, 12.5));
        assert!(entry.contains(55.0, 15.0));
        assert!(!entry.contains(56.0, 12.5));
    }

    #[test]
    fn test_find_first_match() {
        let index = CoverageIndex::new(vec![
            CoverageEntry {
                file: "b".into(),
                coords: [0.0, 5.0, 0.0, 5.0],
            },
            CoverageEntry {
                file: "a".into(),
                coords: [5.0, 10.0, 0.0, 5.0],
            },
        ]);

        assert_eq!(index.entries()[0].file, "a");
        assert_eq!(index.find(2.0, 2.0).map(|e| e.file.as_str()), Some("b"));
        assert_eq!(index.find(5.0, 1.0).map(|e| e.file.as_str()), Some("a"));
        assert!(index.find(-1.0, 1.0).is_none());
    }
}
