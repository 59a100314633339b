//! Reusable grid tile
//!
//! A tile is bound to one coordinate at a time and owns the handle of the
//! load that will fill it. Rebinding or resetting a tile always cancels the
//! previous load first, so a late result can never land on a tile that has
//! moved on to another cell.

use crate::coordinate::Coordinate;
use crate::geometry::Rect;
use crate::loader::{LoadHandle, TileContent};
use crate::pool::Reusable;
use tilegrid_scheduler::CancellationToken;

#[derive(Debug, Default)]
pub struct Tile {
    coordinate: Option<Coordinate>,
    frame: Rect,
    content: Option<TileContent>,
    pending_load: Option<LoadHandle>,
}

impl Tile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound cell, or `None` for a fresh or reset tile
    pub fn coordinate(&self) -> Option<Coordinate> {
        self.coordinate
    }

    /// Placement in scroll-content pixels
    pub fn frame(&self) -> Rect {
        self.frame
    }

    pub fn content(&self) -> Option<&TileContent> {
        self.content.as_ref()
    }

    pub fn pending_load(&self) -> Option<&LoadHandle> {
        self.pending_load.as_ref()
    }

    /// Whether a load for the current binding is still outstanding
    pub fn is_loading(&self) -> bool {
        self.pending_load
            .as_ref()
            .is_some_and(|handle| !handle.is_cancelled())
    }

    /// Bind to `coordinate` at `frame`, dropping whatever the tile showed before
    pub fn bind(&mut self, coordinate: Coordinate, frame: Rect) {
        self.cancel_load();
        self.content = None;
        self.coordinate = Some(coordinate);
        self.frame = frame;
    }

    /// Record the load started for the current binding
    pub fn start_load(&mut self, handle: LoadHandle) {
        self.cancel_load();
        self.pending_load = Some(handle);
    }

    pub fn set_frame(&mut self, frame: Rect) {
        self.frame = frame;
    }

    pub fn cancel_load(&mut self) {
        if let Some(handle) = self.pending_load.take() {
            handle.cancel();
        }
    }

    /// Apply a finished load
    ///
    /// Accepted only if it was issued for the current binding by the load
    /// this tile is still waiting on. Returns whether the content was applied.
    pub fn apply_content(
        &mut self,
        coordinate: Coordinate,
        token: &CancellationToken,
        content: TileContent,
    ) -> bool {
        if !self.accepts(coordinate, token) {
            return false;
        }
        self.pending_load = None;
        self.content = Some(content);
        true
    }

    /// Settle a failed load; the tile stays without content
    pub fn fail_load(&mut self, coordinate: Coordinate, token: &CancellationToken) -> bool {
        if !self.accepts(coordinate, token) {
            return false;
        }
        self.pending_load = None;
        true
    }

    fn accepts(&self, coordinate: Coordinate, token: &CancellationToken) -> bool {
        self.coordinate == Some(coordinate)
            && self
                .pending_load
                .as_ref()
                .is_some_and(|handle| handle.issued(token) && !handle.is_cancelled())
    }
}

impl Reusable for Tile {
    fn prepare_for_reuse(&mut self) {
        self.cancel_load();
        self.content = None;
        self.frame = Rect::ZERO;
        self.coordinate = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point, Size};

    fn frame_at(x: f64, y: f64) -> Rect {
        Rect::new(Point::new(x, y), Size::square(100.0))
    }

    fn content() -> TileContent {
        TileContent::new(vec![255u8; 4], 1, 1)
    }

    #[test]
    fn test_new_tile_is_unbound() {
        let tile = Tile::new();
        assert_eq!(tile.coordinate(), None);
        assert_eq!(tile.frame(), Rect::ZERO);
        assert!(tile.content().is_none());
        assert!(!tile.is_loading());
    }

    #[test]
    fn test_bind_then_complete() {
        let mut tile = Tile::new();
        let token = CancellationToken::new();
        tile.bind(Coordinate::new(1, 1), frame_at(0.0, 0.0));
        tile.start_load(LoadHandle::new(token.clone()));
        assert!(tile.is_loading());

        assert!(tile.apply_content(Coordinate::new(1, 1), &token, content()));
        assert!(tile.content().is_some());
        assert!(!tile.is_loading());
    }

    #[test]
    fn test_rebind_cancels_previous_load() {
        let mut tile = Tile::new();
        let first = CancellationToken::new();
        tile.bind(Coordinate::new(0, 0), frame_at(0.0, 0.0));
        tile.start_load(LoadHandle::new(first.clone()));

        tile.bind(Coordinate::new(5, 5), frame_at(500.0, 500.0));
        assert!(first.is_cancelled());
        assert!(tile.pending_load().is_none());
    }

    #[test]
    fn test_stale_result_is_rejected_after_rebind() {
        let mut tile = Tile::new();
        let stale = CancellationToken::new();
        tile.bind(Coordinate::new(0, 0), frame_at(0.0, 0.0));
        tile.start_load(LoadHandle::new(stale.clone()));

        let fresh = CancellationToken::new();
        tile.bind(Coordinate::new(0, 1), frame_at(0.0, 100.0));
        tile.start_load(LoadHandle::new(fresh.clone()));

        assert!(!tile.apply_content(Coordinate::new(0, 0), &stale, content()));
        assert!(tile.content().is_none());
        assert!(tile.is_loading());
    }

    #[test]
    fn test_same_cell_old_load_is_rejected() {
        // Evicted and reused for the same cell: the first load must still lose.
        let mut tile = Tile::new();
        let old = CancellationToken::new();
        tile.bind(Coordinate::new(2, 2), frame_at(0.0, 0.0));
        tile.start_load(LoadHandle::new(old.clone()));
        tile.prepare_for_reuse();

        let new = CancellationToken::new();
        tile.bind(Coordinate::new(2, 2), frame_at(0.0, 0.0));
        tile.start_load(LoadHandle::new(new.clone()));

        assert!(!tile.apply_content(Coordinate::new(2, 2), &old, content()));
        assert!(tile.apply_content(Coordinate::new(2, 2), &new, content()));
    }

    #[test]
    fn test_fail_load_keeps_tile_empty() {
        let mut tile = Tile::new();
        let token = CancellationToken::new();
        tile.bind(Coordinate::new(3, 3), frame_at(0.0, 0.0));
        tile.start_load(LoadHandle::new(token.clone()));

        assert!(tile.fail_load(Coordinate::new(3, 3), &token));
        assert!(tile.content().is_none());
        assert!(!tile.is_loading());
    }

    #[test]
    fn test_prepare_for_reuse_resets_everything() {
        let mut tile = Tile::new();
        let token = CancellationToken::new();
        tile.bind(Coordinate::new(9, -9), frame_at(10.0, 10.0));
        tile.start_load(LoadHandle::new(token.clone()));
        assert!(tile.apply_content(Coordinate::new(9, -9), &token, content()));

        let reload = CancellationToken::new();
        tile.start_load(LoadHandle::new(reload.clone()));
        tile.prepare_for_reuse();

        assert!(reload.is_cancelled());
        assert_eq!(tile.coordinate(), None);
        assert_eq!(tile.frame(), Rect::ZERO);
        assert!(tile.content().is_none());
    }
}
