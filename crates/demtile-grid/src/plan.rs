//! Regular grid planning over a bounding box.

use crate::{BoundingBox, GridError, Result, TileName};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// An integer sub-window in the raster's coordinate space.
///
/// Fields follow the `-projwin ulx uly lrx lry` argument order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Window {
    /// Upper-left x.
    pub ulx: i64,
    /// Upper-left y.
    pub uly: i64,
    /// Lower-right x.
    pub lrx: i64,
    /// Lower-right y.
    pub lry: i64,
}

impl Window {
    /// Create a window from its four edges.
    pub const fn new(ulx: i64, uly: i64, lrx: i64, lry: i64) -> Self {
        Self { ulx, uly, lrx, lry }
    }

    /// Width along x.
    pub fn width(&self) -> i64 {
        self.lrx - self.ulx
    }

    /// Height along y.
    pub fn height(&self) -> i64 {
        self.uly - self.lry
    }

    /// True when the two windows share interior area.
    pub fn overlaps(&self, other: &Window) -> bool {
        self.ulx < other.lrx && other.ulx < self.lrx && self.lry < other.uly && other.lry < self.uly
    }

    /// Arguments for `gdal_translate -projwin`.
    pub fn projwin(&self) -> [String; 4] {
        [
            self.ulx.to_string(),
            self.uly.to_string(),
            self.lrx.to_string(),
            self.lry.to_string(),
        ]
    }
}

/// A planned sub-window bound to the file it is cut from and the file it becomes.
///
/// Tiles are ephemeral: created by the planner and consumed by exactly one split job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    /// Upper-left x.
    pub ulx: i64,
    /// Upper-left y.
    pub uly: i64,
    /// Lower-right x.
    pub lrx: i64,
    /// Lower-right y.
    pub lry: i64,
    /// Raster the window is cut from.
    pub source_file: PathBuf,
    /// Where the cut window is written.
    pub dest_path: PathBuf,
}

impl Tile {
    /// The tile's coordinate window.
    pub fn window(&self) -> Window {
        Window::new(self.ulx, self.uly, self.lrx, self.lry)
    }

    /// Arguments for `gdal_translate -projwin`.
    pub fn projwin(&self) -> [String; 4] {
        self.window().projwin()
    }
}

/// Largest absolute corner coordinate the planner accepts. Every integer up to
/// this magnitude is exact in an `f64`.
pub const MAX_COORDINATE: f64 = 9.0e15;

/// Most windows one bounding box may be cut into.
pub const MAX_TILES: u64 = 1_000_000;

/// Number of `step`-spaced positions in `first..=last`.
fn grid_count(first: i64, last: i64, step: i64) -> u64 {
    if last < first {
        0
    } else {
        ((last - first) / step) as u64 + 1
    }
}

/// Compute the row-major grid of `step`-sized windows for a bounding box.
///
/// `ulx` walks from `floor(upper_left.x)` to `ceil(lower_right.x) - step` and, for
/// each `ulx`, `uly` walks from `floor(lower_right.y)` to `ceil(upper_left.y) - step`,
/// both inclusive, emitting `(ulx, uly, ulx + step, uly - step)`. Partial trailing
/// windows are dropped, never clipped. A box smaller than `step` in either
/// dimension yields no windows.
///
/// Corners beyond [`MAX_COORDINATE`] fail with [`GridError::InvalidBoundingBox`],
/// and a grid of more than [`MAX_TILES`] windows fails with
/// [`GridError::TooManyTiles`] before anything is allocated.
pub fn plan_tiles(bbox: &BoundingBox, step: u32) -> Result<Vec<Window>> {
    if step == 0 {
        return Err(GridError::InvalidStep(step));
    }

    let step_f = f64::from(step);
    if bbox.width() < step_f || bbox.height() < step_f {
        tracing::debug!(
            "Bounding box {:.4}x{:.4} is smaller than step {}, no tiles planned",
            bbox.width(),
            bbox.height(),
            step
        );
        return Ok(Vec::new());
    }

    let step = i64::from(step);
    let ul = bbox.upper_left();
    let lr = bbox.lower_right();
    if [ul.x, ul.y, lr.x, lr.y].iter().any(|v| v.abs() > MAX_COORDINATE) {
        return Err(GridError::InvalidBoundingBox {
            ulx: ul.x,
            uly: ul.y,
            lrx: lr.x,
            lry: lr.y,
        });
    }

    // Within MAX_COORDINATE every rounded corner is an exact i64 and none of the
    // sums below can overflow.
    let x_first = ul.x.floor() as i64;
    let x_last = lr.x.ceil() as i64 - step;
    let y_first = lr.y.floor() as i64;
    let y_last = ul.y.ceil() as i64 - step;

    let columns = grid_count(x_first, x_last, step);
    let rows = grid_count(y_first, y_last, step);
    let count = columns
        .checked_mul(rows)
        .filter(|&n| n <= MAX_TILES)
        .ok_or(GridError::TooManyTiles {
            columns,
            rows,
            limit: MAX_TILES,
        })?;

    let mut windows = Vec::with_capacity(count as usize);
    let mut ulx = x_first;
    while ulx <= x_last {
        let mut uly = y_first;
        while uly <= y_last {
            windows.push(Window::new(ulx, uly, ulx + step, uly - step));
            uly += step;
        }
        ulx += step;
    }

    Ok(windows)
}

/// Plan tiles for one source raster, naming each output under `dest_dir`.
pub fn plan_tiles_for_file(
    bbox: &BoundingBox,
    step: u32,
    source_file: &Path,
    dest_dir: &Path,
) -> Result<Vec<Tile>> {
    let source_name = source_file
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| GridError::InvalidTileName(source_file.display().to_string()))?;

    let tiles = plan_tiles(bbox, step)?
        .into_iter()
        .map(|window| Tile {
            ulx: window.ulx,
            uly: window.uly,
            lrx: window.lrx,
            lry: window.lry,
            source_file: source_file.to_path_buf(),
            dest_path: dest_dir.join(TileName::new(window, source_name).to_string()),
        })
        .collect();

    Ok(tiles)
}
