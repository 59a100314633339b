//! Pixel-space geometry shared by the engine and the viewport adapter.

use std::ops::{Add, Sub};

/// A point (or offset) in scroll-content pixels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Width and height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const ZERO: Size = Size {
        width: 0.0,
        height: 0.0,
    };

    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn square(side: f64) -> Self {
        Self::new(side, side)
    }
}

/// Axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub const ZERO: Rect = Rect {
        origin: Point::ZERO,
        size: Size::ZERO,
    };

    pub fn new(origin: Point, size: Size) -> Self {
        Self { origin, size }
    }

    pub fn min_x(&self) -> f64 {
        self.origin.x
    }

    pub fn min_y(&self) -> f64 {
        self.origin.y
    }

    pub fn max_x(&self) -> f64 {
        self.origin.x + self.size.width
    }

    pub fn max_y(&self) -> f64 {
        self.origin.y + self.size.height
    }

    pub fn center(&self) -> Point {
        Point::new(
            self.origin.x + self.size.width * 0.5,
            self.origin.y + self.size.height * 0.5,
        )
    }

    /// Strict overlap test; rectangles that only share an edge do not intersect
    pub fn intersects(&self, other: &Rect) -> bool {
        self.max_x() > other.min_x()
            && self.min_x() < other.max_x()
            && self.max_y() > other.min_y()
            && self.min_y() < other.max_y()
    }

    /// Same rectangle moved by `-delta`
    pub fn shifted_back(&self, delta: Point) -> Rect {
        Rect::new(self.origin - delta, self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_arithmetic() {
        let a = Point::new(3.0, -2.0);
        let b = Point::new(1.0, 1.0);
        assert_eq!(a + b, Point::new(4.0, -1.0));
        assert_eq!(a - b, Point::new(2.0, -3.0));
    }

    #[test]
    fn test_rect_edges_and_center() {
        let rect = Rect::new(Point::new(10.0, 20.0), Size::new(100.0, 50.0));
        assert_eq!(rect.max_x(), 110.0);
        assert_eq!(rect.max_y(), 70.0);
        assert_eq!(rect.center(), Point::new(60.0, 45.0));
    }

    #[test]
    fn test_rect_intersection() {
        let viewport = Rect::new(Point::ZERO, Size::new(800.0, 600.0));
        let inside = Rect::new(Point::new(700.0, 500.0), Size::square(256.0));
        let touching = Rect::new(Point::new(800.0, 0.0), Size::square(256.0));
        let outside = Rect::new(Point::new(-300.0, 0.0), Size::square(256.0));

        assert!(viewport.intersects(&inside));
        assert!(!viewport.intersects(&touching));
        assert!(!viewport.intersects(&outside));
    }

    #[test]
    fn test_shifted_back_keeps_size() {
        let rect = Rect::new(Point::new(500.0, 500.0), Size::square(100.0));
        let moved = rect.shifted_back(Point::new(300.0, -100.0));
        assert_eq!(moved.origin, Point::new(200.0, 600.0));
        assert_eq!(moved.size, rect.size);
    }
}
