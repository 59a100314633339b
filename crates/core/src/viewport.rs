//! Viewport adapter
//!
//! The grid engine never talks to a UI toolkit directly. It reads the scroll
//! state through the [`Viewport`] trait and writes the offset back when it
//! recenters. [`ScrollViewport`] is a plain in-memory scroll container used by
//! headless embedders and tests.

use crate::geometry::{Point, Rect, Size};

/// What the engine needs from the host scroll container
///
/// All positions are in scroll-content pixels: the offset is the content
/// point shown at the container's top-left corner.
pub trait Viewport {
    /// Current scroll offset
    fn offset(&self) -> Point;

    /// Size of the visible container area
    fn visible_size(&self) -> Size;

    /// Center of the grid surface, in content pixels
    fn surface_center(&self) -> Point;

    /// Jump to `offset` immediately, without animation
    fn set_offset(&mut self, offset: Point);

    /// Visible region in content pixels
    fn visible_rect(&self) -> Rect {
        Rect::new(self.offset(), self.visible_size())
    }
}

/// A bounded scroll container holding the grid surface
///
/// The surface sits `inset` pixels away from every edge of the scrollable
/// content. User scrolling is clamped to the content bounds, so without
/// periodic recentering a long enough drag would hit the edge.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollViewport {
    container: Size,
    surface: Size,
    inset: f64,
    offset: Point,
}

impl ScrollViewport {
    /// Container scrolled to the content's top-left corner
    pub fn new(container: Size, surface: Size, inset: f64) -> Self {
        Self {
            container,
            surface,
            inset,
            offset: Point::ZERO,
        }
    }

    /// Container scrolled so the surface center sits in the middle of the view
    pub fn centered(container: Size, surface: Size, inset: f64) -> Self {
        let mut viewport = Self::new(container, surface, inset);
        viewport.center_on_surface();
        viewport
    }

    pub fn center_on_surface(&mut self) {
        self.offset = Point::new(
            self.inset - (self.container.width - self.surface.width) * 0.5,
            self.inset - (self.container.height - self.surface.height) * 0.5,
        );
    }

    /// Total scrollable content: surface plus inset on every side
    pub fn content_size(&self) -> Size {
        Size::new(
            self.surface.width + 2.0 * self.inset,
            self.surface.height + 2.0 * self.inset,
        )
    }

    pub fn surface_frame(&self) -> Rect {
        Rect::new(Point::new(self.inset, self.inset), self.surface)
    }

    /// Largest offset user scrolling can reach
    pub fn max_offset(&self) -> Point {
        let content = self.content_size();
        Point::new(
            (content.width - self.container.width).max(0.0),
            (content.height - self.container.height).max(0.0),
        )
    }

    /// Scroll by a user drag, clamped to the content bounds
    ///
    /// Returns the delta actually applied.
    pub fn scroll_by(&mut self, dx: f64, dy: f64) -> Point {
        let max = self.max_offset();
        let before = self.offset;
        self.offset = Point::new(
            (self.offset.x + dx).clamp(0.0, max.x),
            (self.offset.y + dy).clamp(0.0, max.y),
        );
        self.offset - before
    }

    /// Change the container size, keeping the same content point at its center
    pub fn resize(&mut self, container: Size) {
        let center = self.visible_rect().center();
        self.container = container;
        self.offset = Point::new(
            center.x - container.width * 0.5,
            center.y - container.height * 0.5,
        );
    }
}

impl Viewport for ScrollViewport {
    fn offset(&self) -> Point {
        self.offset
    }

    fn visible_size(&self) -> Size {
        self.container
    }

    fn surface_center(&self) -> Point {
        self.surface_frame().center()
    }

    fn set_offset(&mut self, offset: Point) {
        self.offset = offset;
    }
}
