//! Slippy Map tile addressing for AWS Terrain Tiles.
//!
//! Tiles are 512x512 GeoTIFFs served from
//! `https://s3.amazonaws.com/elevation-tiles-prod/geotiff/{z}/{x}/{y}.tif`.
//!
//! - `z` is the zoom level (1-14)
//! - `x` is the column (0 to 2^z - 1, west to east)
//! - `y` is the row (0 to 2^z - 1, north to south)
//!
//! At zoom 12 a tile covers about 0.088° (roughly 9.8 km at the equator).

use crate::{FetchError, Result};
use demtile_grid::BoundingBox;
use std::f64::consts::PI;
use std::path::{Path, PathBuf};

/// AWS S3 base URL for elevation tiles.
const AWS_TILE_BASE_URL: &str = "https://s3.amazonaws.com/elevation-tiles-prod/geotiff";

/// Web Mercator latitude limit, arctan(sinh(π)).
const MAX_MERCATOR_LAT: f64 = 85.0511;

pub const MIN_ZOOM: u8 = 1;
pub const MAX_ZOOM: u8 = 14;
pub const DEFAULT_ZOOM: u8 = 12;

/// OSM-style tile coordinates (z, x, y).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

fn check_zoom(z: u8) -> Result<()> {
    if !(MIN_ZOOM..=MAX_ZOOM).contains(&z) {
        return Err(FetchError::InvalidZoomLevel(z));
    }
    Ok(())
}

impl TileCoord {
    /// Create a tile coordinate, checking it exists at zoom `z`.
    pub fn new(z: u8, x: u32, y: u32) -> Result<Self> {
        check_zoom(z)?;
        let max_coord = 1u32 << z;
        if x >= max_coord || y >= max_coord {
            return Err(FetchError::InvalidUrl(format!(
                "tile {}/{}/{} out of range for zoom {}",
                z, x, y, z
            )));
        }
        Ok(Self { z, x, y })
    }

    /// Tile containing a latitude/longitude.
    ///
    /// - x = floor((lon + 180) / 360 * 2^z)
    /// - y = floor((1 - ln(tan(lat) + sec(lat)) / π) / 2 * 2^z)
    ///
    /// Latitudes beyond the Web Mercator limit are clamped.
    pub fn from_lat_lon(lat: f64, lon: f64, z: u8) -> Result<Self> {
        check_zoom(z)?;

        let lat = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
        let n = f64::from(1u32 << z);

        let x = ((lon + 180.0) / 360.0 * n).floor().max(0.0) as u32;
        let lat_rad = lat.to_radians();
        let y = ((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n)
            .floor()
            .max(0.0) as u32;

        // Exactly +180° or the clamped south edge land one past the last tile.
        let max_coord = (1u32 << z) - 1;
        Ok(Self {
            z,
            x: x.min(max_coord),
            y: y.min(max_coord),
        })
    }

    /// Tile extent as `(min_lat, max_lat, min_lon, max_lon)`.
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        let n = f64::from(1u32 << self.z);

        let min_lon = f64::from(self.x) / n * 360.0 - 180.0;
        let max_lon = f64::from(self.x + 1) / n * 360.0 - 180.0;

        let max_lat = (PI * (1.0 - 2.0 * f64::from(self.y) / n)).sinh().atan().to_degrees();
        let min_lat = (PI * (1.0 - 2.0 * f64::from(self.y + 1) / n)).sinh().atan().to_degrees();

        (min_lat, max_lat, min_lon, max_lon)
    }

    /// `{cache_dir}/{z}/{x}/{y}.tif`
    pub fn cache_path(&self, cache_dir: &Path) -> PathBuf {
        cache_dir
            .join(self.z.to_string())
            .join(self.x.to_string())
            .join(format!("{}.tif", self.y))
    }

    pub fn aws_url(&self) -> String {
        format!("{}/{}/{}/{}.tif", AWS_TILE_BASE_URL, self.z, self.x, self.y)
    }
}

/// Every tile at `zoom` touching a region, with x as longitude and y as latitude.
///
/// Column and row ranges are inclusive; the result is ordered by column, then row.
pub fn tiles_for_region(bbox: &BoundingBox, zoom: u8) -> Result<Vec<TileCoord>> {
    let ul = bbox.upper_left();
    let lr = bbox.lower_right();
    let first = TileCoord::from_lat_lon(ul.y, ul.x, zoom)?;
    let last = TileCoord::from_lat_lon(lr.y, lr.x, zoom)?;

    let mut tiles = Vec::new();
    for x in first.x..=last.x {
        for y in first.y..=last.y {
            tiles.push(TileCoord { z: zoom, x, y });
        }
    }
    Ok(tiles)
}
