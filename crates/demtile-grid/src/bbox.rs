//! Raster bounding boxes and corner metadata parsing.

use crate::{GridError, Result};
use serde::{Deserialize, Serialize};

/// GDAL pads both corner labels to the same column width.
const UPPER_LEFT_MARKER: &str = "Upper Left  (";
const LOWER_RIGHT_MARKER: &str = "Lower Right (";

/// A coordinate pair in the raster's georeferenced space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Easting / longitude.
    pub x: f64,
    /// Northing / latitude.
    pub y: f64,
}

impl Point {
    /// Create a new point.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Corner coordinates of a north-up raster.
///
/// Construction validates `upper_left.x < lower_right.x` and
/// `upper_left.y > lower_right.y`; a `BoundingBox` is immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    upper_left: Point,
    lower_right: Point,
}

impl BoundingBox {
    /// Create a bounding box, rejecting corners that are not north-up.
    pub fn new(upper_left: Point, lower_right: Point) -> Result<Self> {
        let finite = [upper_left.x, upper_left.y, lower_right.x, lower_right.y]
            .iter()
            .all(|v| v.is_finite());

        if !finite || upper_left.x >= lower_right.x || upper_left.y <= lower_right.y {
            return Err(GridError::InvalidBoundingBox {
                ulx: upper_left.x,
                uly: upper_left.y,
                lrx: lower_right.x,
                lry: lower_right.y,
            });
        }

        Ok(Self {
            upper_left,
            lower_right,
        })
    }

    /// Upper-left (north-west) corner.
    pub fn upper_left(&self) -> Point {
        self.upper_left
    }

    /// Lower-right (south-east) corner.
    pub fn lower_right(&self) -> Point {
        self.lower_right
    }

    /// Extent along x.
    pub fn width(&self) -> f64 {
        self.lower_right.x - self.upper_left.x
    }

    /// Extent along y.
    pub fn height(&self) -> f64 {
        self.upper_left.y - self.lower_right.y
    }

    /// Check if a coordinate lies within the box (edges inclusive).
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.upper_left.x
            && x <= self.lower_right.x
            && y >= self.lower_right.y
            && y <= self.upper_left.y
    }
}

/// Parse the corner coordinates out of raster metadata text.
///
/// The text is expected to contain lines like
///
/// ```text
/// Upper Left  (  10.0000000,  60.0000000) ( 10d 0' 0.00"E, 60d 0' 0.00"N)
/// Lower Right (  20.0000000,  50.0000000) ( 20d 0' 0.00"E, 50d 0' 0.00"N)
/// ```
///
/// The last occurrence of each marker wins, and only the first parenthesized
/// pair after it is read.
pub fn parse_corner_metadata(text: &str) -> Result<BoundingBox> {
    let upper_left = parse_corner(text, UPPER_LEFT_MARKER)?;
    let lower_right = parse_corner(text, LOWER_RIGHT_MARKER)?;
    BoundingBox::new(upper_left, lower_right)
}

fn parse_corner(text: &str, marker: &str) -> Result<Point> {
    let start = text
        .rfind(marker)
        .map(|idx| idx + marker.len())
        .ok_or_else(|| GridError::MetadataParse(format!("missing '{}' marker", marker.trim_end_matches('('))))?;

    let rest = &text[start..];
    let end = rest
        .find(')')
        .ok_or_else(|| GridError::MetadataParse(format!("unterminated coordinate after '{}'", marker)))?;

    let mut parts = rest[..end].split(',').map(str::trim);
    let (Some(x), Some(y), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(GridError::MetadataParse(format!(
            "expected an (x, y) pair, got '({})'",
            &rest[..end]
        )));
    };

    let parse = |s: &str| {
        s.parse::<f64>()
            .map_err(|e| GridError::MetadataParse(format!("invalid coordinate '{}': {}", s, e)))
    };

    Ok(Point::new(parse(x)?, parse(y)?))
}
