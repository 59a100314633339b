//! Infinite grid engine
//!
//! Maps the scroll state of a bounded viewport onto an unbounded grid of
//! tiles. Only the cells around the viewport center are materialized; tiles
//! leaving that window are recycled through the [`TilePool`].
//!
//! Tile frames are expressed relative to a *reference coordinate*, the cell
//! drawn at the grid surface's center. When scrolling settles the engine
//! recenters: it moves the reference to the current center cell and shifts
//! every tile frame and the viewport offset by the same amount. Nothing moves
//! on screen, and pixel values stay close to the surface center no matter how
//! far the user travels in grid space.

use std::collections::{BTreeSet, HashSet};
use std::sync::mpsc::{self, Receiver, Sender};

use tilegrid_scheduler::{CancellationToken, JobPriority};

use crate::coordinate::{Coordinate, GridBounds};
use crate::geometry::{Point, Rect, Size};
use crate::loader::{CompletionSink, ContentLoader, LoadCompletion, LoadRequest};
use crate::pool::{TileId, TileKind, TilePool};
use crate::tile::Tile;
use crate::viewport::Viewport;

const KIND: TileKind = TileKind::GRID_TILE;

/// Grid cell under the center of the visible region
///
/// The distance between the visible center and the surface center is divided
/// by `tile_size`, rounded half away from zero, and offset by `reference`.
pub fn computed_center(
    offset: Point,
    visible_size: Size,
    surface_center: Point,
    tile_size: f64,
    reference: Coordinate,
) -> Coordinate {
    let dx = offset.x + visible_size.width * 0.5 - surface_center.x;
    let dy = offset.y + visible_size.height * 0.5 - surface_center.y;
    reference.translated(
        (dx / tile_size).round() as i64,
        (dy / tile_size).round() as i64,
    )
}

/// Cells to keep materialized around `center`
///
/// The radius is a whole viewport in each direction, which leaves a buffer
/// ring beyond the strictly visible cells so fast scrolling does not pop in.
pub fn visible_bounds(center: Coordinate, visible_size: Size, tile_size: f64) -> GridBounds {
    let tiles_required_x = (visible_size.width / tile_size).floor() as i64;
    let tiles_required_y = (visible_size.height / tile_size).floor() as i64;
    GridBounds::around(center, tiles_required_x, tiles_required_y)
}

/// Summary of a layout pass that changed the presenting set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayoutChange {
    pub center: Coordinate,
    pub populated: usize,
    pub evicted: usize,
}

/// Running counters, mostly for logging and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineStats {
    pub layout_passes: u64,
    pub tiles_constructed: u64,
    pub tiles_reused: u64,
    pub tiles_evicted: u64,
    pub realignments: u64,
    pub zooms: u64,
    pub loads_started: u64,
    pub loads_applied: u64,
    pub loads_failed: u64,
    pub stale_completions: u64,
}

/// The virtualized grid
///
/// Single-threaded: every method must be called from the thread that owns
/// the viewport. Content loads run elsewhere and come back through
/// [`apply_completions`](GridEngine::apply_completions).
pub struct GridEngine<L> {
    tile_size: f64,
    reference: Coordinate,
    center: Option<Coordinate>,
    bounds: Option<GridBounds>,
    pool: TilePool<Tile>,
    loader: L,
    completions_tx: Sender<LoadCompletion>,
    completions_rx: Receiver<LoadCompletion>,
    stats: EngineStats,
}

impl<L: ContentLoader> GridEngine<L> {
    /// Create an engine with no tiles yet
    ///
    /// Call [`update_layout`](GridEngine::update_layout) once the viewport is
    /// in place to populate the initial window.
    pub fn new(tile_size: f64, loader: L) -> Self {
        let (completions_tx, completions_rx) = mpsc::channel();
        Self {
            tile_size,
            reference: Coordinate::ORIGIN,
            center: None,
            bounds: None,
            pool: TilePool::new(),
            loader,
            completions_tx,
            completions_rx,
            stats: EngineStats::default(),
        }
    }

    pub fn tile_size(&self) -> f64 {
        self.tile_size
    }

    /// Cell drawn at the surface center as of the last recentering
    pub fn reference_coordinate(&self) -> Coordinate {
        self.reference
    }

    /// Cell under the viewport center as of the last layout pass
    pub fn center_coordinate(&self) -> Option<Coordinate> {
        self.center
    }

    /// Window of cells kept presenting by the last layout pass
    pub fn bounds(&self) -> Option<GridBounds> {
        self.bounds
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn tile(&self, id: TileId) -> Option<&Tile> {
        self.pool.get(id)
    }

    /// Presenting tiles, for the embedder to draw
    pub fn tiles(&self) -> impl Iterator<Item = (TileId, &Tile)> + '_ {
        self.pool
            .presenting(KIND)
            .filter_map(move |id| self.pool.get(id).map(|tile| (id, tile)))
    }

    pub fn presenting_count(&self) -> usize {
        self.pool.presenting_count(KIND)
    }

    pub fn free_count(&self) -> usize {
        self.pool.free_count(KIND)
    }

    /// Tiles ever constructed; grows only when the free set runs dry
    pub fn constructed_count(&self) -> usize {
        self.pool.len()
    }

    pub fn presenting_coordinates(&self) -> BTreeSet<Coordinate> {
        self.tiles().filter_map(|(_, tile)| tile.coordinate()).collect()
    }

    /// Presenting tile bound to `coordinate`, if any
    ///
    /// Linear in the number of presenting tiles.
    pub fn tile_at(&self, coordinate: Coordinate) -> Option<(TileId, &Tile)> {
        self.tiles()
            .find(|(_, tile)| tile.coordinate() == Some(coordinate))
    }

    /// Placement of `coordinate` relative to the current reference
    ///
    /// The `-0.5` centers cell `reference` on the surface center rather than
    /// putting its corner there.
    pub fn frame_for(&self, coordinate: Coordinate, surface_center: Point) -> Rect {
        let (dx, dy) = coordinate.offset_from(self.reference);
        let origin = Point::new(
            surface_center.x + self.tile_size * (dx as f64 - 0.5),
            surface_center.y + self.tile_size * (dy as f64 - 0.5),
        );
        Rect::new(origin, Size::square(self.tile_size))
    }

    /// Bring the presenting set in line with the viewport
    ///
    /// Returns `None` when the center cell has not changed since the last
    /// pass; the presenting set is then already correct.
    pub fn update_layout<V: Viewport + ?Sized>(&mut self, viewport: &V) -> Option<LayoutChange> {
        let visible_size = viewport.visible_size();
        let surface_center = viewport.surface_center();
        let center = computed_center(
            viewport.offset(),
            visible_size,
            surface_center,
            self.tile_size,
            self.reference,
        );
        if self.center == Some(center) {
            return None;
        }

        self.center = Some(center);
        self.stats.layout_passes += 1;
        let bounds = visible_bounds(center, visible_size, self.tile_size);
        self.bounds = Some(bounds);

        let visible_rect = viewport.visible_rect();
        let presenting: HashSet<Coordinate> =
            self.tiles().filter_map(|(_, tile)| tile.coordinate()).collect();

        let mut populated = 0;
        for coordinate in bounds.iter() {
            if !presenting.contains(&coordinate) {
                self.allocate_tile(coordinate, surface_center, &visible_rect);
                populated += 1;
            }
        }

        let outside: Vec<TileId> = self
            .tiles()
            .filter(|(_, tile)| !tile.coordinate().is_some_and(|c| bounds.contains(c)))
            .map(|(id, _)| id)
            .collect();
        let evicted = outside.len();
        for id in outside {
            self.evict(id);
        }

        tracing::debug!(
            %center,
            populated,
            evicted,
            presenting = self.presenting_count(),
            free = self.free_count(),
            "layout pass"
        );
        Some(LayoutChange {
            center,
            populated,
            evicted,
        })
    }

    /// Move the reference coordinate to the current center cell
    ///
    /// Every presenting frame and the viewport offset shift by the same
    /// amount in one call, so on-screen positions are unchanged. Returns
    /// whether anything moved.
    pub fn realign<V: Viewport + ?Sized>(&mut self, viewport: &mut V) -> bool {
        let Some(center) = self.center else {
            return false;
        };
        if center == self.reference {
            return false;
        }

        let (dx, dy) = center.offset_from(self.reference);
        let delta = Point::new(dx as f64 * self.tile_size, dy as f64 * self.tile_size);

        let ids: Vec<TileId> = self.pool.presenting(KIND).collect();
        for id in ids {
            if let Some(tile) = self.pool.get_mut(id) {
                tile.set_frame(tile.frame().shifted_back(delta));
            }
        }
        viewport.set_offset(viewport.offset() - delta);
        self.reference = center;
        self.stats.realignments += 1;

        tracing::debug!(reference = %center, dx = delta.x, dy = delta.y, "realigned grid");
        true
    }

    /// Rescale tiles by `scale`
    ///
    /// All tiles are recycled and the window is rebuilt at the new size. The
    /// viewport's distance from the surface center is scaled too, so the grid
    /// point under the viewport center stays where it is. `scale` is not
    /// range-checked; callers clamp it (see
    /// [`ZoomPolicy`](crate::controller::ZoomPolicy)).
    pub fn zoom<V: Viewport + ?Sized>(&mut self, scale: f64, viewport: &mut V) {
        for id in self.pool.detach_all(KIND) {
            self.pool.release(id, KIND);
            self.stats.tiles_evicted += 1;
        }

        let anchor = viewport.surface_center();
        let visible = viewport.visible_size();
        let offset = viewport.offset();
        let from_anchor = Point::new(
            offset.x + visible.width * 0.5 - anchor.x,
            offset.y + visible.height * 0.5 - anchor.y,
        );
        viewport.set_offset(Point::new(
            offset.x + from_anchor.x * (scale - 1.0),
            offset.y + from_anchor.y * (scale - 1.0),
        ));

        self.tile_size *= scale;
        self.center = None;
        self.stats.zooms += 1;
        tracing::debug!(scale, tile_size = self.tile_size, "zoom");

        self.update_layout(&*viewport);
        self.realign(viewport);
    }

    /// Apply every load result that has arrived since the last call
    ///
    /// Results for tiles that were rebound, reset or re-requested in the
    /// meantime are dropped. Returns the number of tiles that received content.
    pub fn apply_completions(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.completions_rx.try_recv() {
            let LoadCompletion {
                tile: id,
                coordinate,
                result,
                token,
            } = completion;
            let Some(tile) = self.pool.get_mut(id) else {
                continue;
            };

            match result {
                Ok(content) => {
                    if tile.apply_content(coordinate, &token, content) {
                        applied += 1;
                        self.stats.loads_applied += 1;
                    } else {
                        self.stats.stale_completions += 1;
                        tracing::trace!(tile = %id, %coordinate, "dropped stale content");
                    }
                }
                Err(err) => {
                    if tile.fail_load(coordinate, &token) {
                        self.stats.loads_failed += 1;
                        tracing::debug!(tile = %id, %coordinate, error = %err, "tile left empty");
                    } else {
                        self.stats.stale_completions += 1;
                    }
                }
            }
        }
        applied
    }

    fn allocate_tile(&mut self, coordinate: Coordinate, surface_center: Point, visible: &Rect) {
        let id = match self.pool.take_free(KIND) {
            Some(id) => {
                self.stats.tiles_reused += 1;
                id
            }
            None => {
                self.stats.tiles_constructed += 1;
                self.pool.insert(Tile::new())
            }
        };

        let frame = self.frame_for(coordinate, surface_center);
        let priority = if frame.intersects(visible) {
            JobPriority::Visible
        } else {
            JobPriority::Margin
        };
        let request = LoadRequest {
            key: coordinate.key(),
            coordinate,
            pixel_size: frame.size.width.min(frame.size.height) as u32,
            priority,
            sink: CompletionSink::new(
                id,
                coordinate,
                CancellationToken::new(),
                self.completions_tx.clone(),
            ),
        };

        if let Some(tile) = self.pool.get_mut(id) {
            tile.bind(coordinate, frame);
            let handle = self.loader.load(request);
            tile.start_load(handle);
            self.stats.loads_started += 1;
        }
        self.pool.attach(id, KIND);
        tracing::trace!(tile = %id, %coordinate, ?priority, "tile bound");
    }

    fn evict(&mut self, id: TileId) {
        if let Some(coordinate) = self.pool.get(id).and_then(Tile::coordinate) {
            tracing::trace!(tile = %id, %coordinate, "tile evicted");
        }
        self.pool.release(id, KIND);
        self.stats.tiles_evicted += 1;
    }
}
