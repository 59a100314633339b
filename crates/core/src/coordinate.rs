//! Integer grid coordinates
//!
//! A [`Coordinate`] names one cell of the unbounded grid, independent of
//! pixel units. Its [`key`](Coordinate::key) is what the content pipeline
//! caches fetched images under.

use std::fmt;

/// Address of one grid cell
///
/// (0, 0) is the cell centered on the grid surface when the engine starts;
/// x grows to the right and y grows downwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Coordinate {
    pub x: i64,
    pub y: i64,
}

impl Coordinate {
    pub const ORIGIN: Coordinate = Coordinate { x: 0, y: 0 };

    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Cache key for this cell
    ///
    /// Decimal components joined by `,`. Integers never contain a comma, so
    /// distinct coordinates always produce distinct keys.
    pub fn key(&self) -> String {
        format!("{},{}", self.x, self.y)
    }

    /// Component-wise `self - other`, in cells
    pub fn offset_from(&self, other: Coordinate) -> (i64, i64) {
        (self.x - other.x, self.y - other.y)
    }

    /// Cell reached by moving `dx`, `dy` cells from here
    pub fn translated(&self, dx: i64, dy: i64) -> Coordinate {
        Coordinate::new(self.x + dx, self.y + dy)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl From<(i64, i64)> for Coordinate {
    fn from((x, y): (i64, i64)) -> Self {
        Self::new(x, y)
    }
}

/// Inclusive rectangle of grid cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridBounds {
    pub min_x: i64,
    pub max_x: i64,
    pub min_y: i64,
    pub max_y: i64,
}

impl GridBounds {
    /// Cells within `radius_x` columns and `radius_y` rows of `center`
    pub fn around(center: Coordinate, radius_x: i64, radius_y: i64) -> Self {
        Self {
            min_x: center.x - radius_x,
            max_x: center.x + radius_x,
            min_y: center.y - radius_y,
            max_y: center.y + radius_y,
        }
    }

    pub fn contains(&self, coordinate: Coordinate) -> bool {
        (self.min_x..=self.max_x).contains(&coordinate.x)
            && (self.min_y..=self.max_y).contains(&coordinate.y)
    }

    pub fn width(&self) -> u64 {
        (self.max_x - self.min_x + 1).max(0) as u64
    }

    pub fn height(&self) -> u64 {
        (self.max_y - self.min_y + 1).max(0) as u64
    }

    pub fn cell_count(&self) -> u64 {
        self.width() * self.height()
    }

    /// Row-major iteration over every cell
    pub fn iter(&self) -> impl Iterator<Item = Coordinate> + '_ {
        (self.min_y..=self.max_y)
            .flat_map(move |y| (self.min_x..=self.max_x).map(move |x| Coordinate::new(x, y)))
    }
}
