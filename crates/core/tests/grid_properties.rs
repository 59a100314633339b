use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tilegrid_core::{
    ContentLoader, Coordinate, GridEngine, LoadHandle, LoadRequest, Point, ScrollViewport, Size,
    TileContent, Viewport,
};

/// Keeps every request so tests can complete them by hand
#[derive(Default)]
struct RecordingLoader {
    requests: RefCell<Vec<LoadRequest>>,
}

impl RecordingLoader {
    fn take(&self, coordinate: Coordinate) -> Option<LoadRequest> {
        let mut requests = self.requests.borrow_mut();
        let position = requests.iter().rposition(|r| r.coordinate == coordinate)?;
        Some(requests.remove(position))
    }
}

impl ContentLoader for RecordingLoader {
    fn load(&self, request: LoadRequest) -> LoadHandle {
        let handle = request.handle();
        self.requests.borrow_mut().push(request);
        handle
    }
}

/// Viewport with fixed geometry, for checking the center computation
struct FixedViewport {
    offset: Point,
    visible: Size,
    surface_center: Point,
}

impl Viewport for FixedViewport {
    fn offset(&self) -> Point {
        self.offset
    }

    fn visible_size(&self) -> Size {
        self.visible
    }

    fn surface_center(&self) -> Point {
        self.surface_center
    }

    fn set_offset(&mut self, offset: Point) {
        self.offset = offset;
    }
}

fn phone() -> ScrollViewport {
    let screen = Size::new(390.0, 844.0);
    ScrollViewport::centered(screen, screen, 844.0 * 100.0)
}

fn engine(tile_size: f64) -> GridEngine<RecordingLoader> {
    GridEngine::new(tile_size, RecordingLoader::default())
}

fn expected_coordinates(engine: &GridEngine<RecordingLoader>) -> BTreeSet<Coordinate> {
    engine.bounds().expect("layout ran").iter().collect()
}

/// On-screen origin of every presenting tile
fn screen_positions<V: Viewport>(
    engine: &GridEngine<RecordingLoader>,
    viewport: &V,
) -> BTreeMap<Coordinate, Point> {
    engine
        .tiles()
        .map(|(_, tile)| {
            let coordinate = tile.coordinate().expect("presenting tiles are bound");
            (coordinate, tile.frame().origin - viewport.offset())
        })
        .collect()
}

fn assert_close(a: Point, b: Point) {
    assert!(
        (a.x - b.x).abs() < 1e-6 && (a.y - b.y).abs() < 1e-6,
        "{a:?} != {b:?}"
    );
}

#[test]
fn center_example_from_raw_offset() {
    let mut engine = engine(100.0);
    let viewport = FixedViewport {
        offset: Point::new(250.0, -150.0),
        visible: Size::ZERO,
        surface_center: Point::ZERO,
    };

    let change = engine.update_layout(&viewport).unwrap();
    assert_eq!(change.center, Coordinate::new(3, -2));
    assert_eq!(engine.presenting_coordinates(), BTreeSet::from([Coordinate::new(3, -2)]));
}

#[test]
fn layout_is_idempotent_within_a_cell() {
    let mut engine = engine(100.0);
    let mut viewport = phone();
    engine.update_layout(&viewport);
    let before = screen_positions(&engine, &viewport);
    let constructed = engine.constructed_count();

    for (dx, dy) in [(10.0, 0.0), (-30.0, 45.0), (40.0, -49.0)] {
        viewport.scroll_by(dx, dy);
        assert!(engine.update_layout(&viewport).is_none());
    }
    viewport.scroll_by(-20.0, 4.0);
    assert!(engine.update_layout(&viewport).is_none());

    assert_eq!(engine.constructed_count(), constructed);
    let after: BTreeSet<Coordinate> = screen_positions(&engine, &viewport).into_keys().collect();
    assert_eq!(after, before.into_keys().collect::<BTreeSet<_>>());
}

#[test]
fn presenting_set_matches_bounds_during_random_walk() {
    let mut rng = StdRng::seed_from_u64(0x7117);
    let mut engine = engine(100.0);
    let mut viewport = phone();
    engine.update_layout(&viewport);

    for step in 0..400 {
        let dx = rng.gen_range(-250.0..250.0);
        let dy = rng.gen_range(-250.0..250.0);
        viewport.scroll_by(dx, dy);
        engine.update_layout(&viewport);
        if step % 25 == 0 {
            engine.realign(&mut viewport);
        }

        let bounds = engine.bounds().unwrap();
        assert_eq!(engine.presenting_coordinates(), expected_coordinates(&engine));
        assert_eq!(engine.presenting_count() as u64, bounds.cell_count());
        assert_eq!(
            engine.presenting_count() + engine.free_count(),
            engine.constructed_count(),
            "every tile is either presenting or free"
        );
    }
    assert!(engine.stats().tiles_reused > 0);
}

#[test]
fn realign_preserves_on_screen_positions() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..20 {
        let tile_size = rng.gen_range(40.0..300.0);
        let mut engine = engine(tile_size);
        let mut viewport = phone();
        engine.update_layout(&viewport);

        viewport.scroll_by(rng.gen_range(-5_000.0..5_000.0), rng.gen_range(-5_000.0..5_000.0));
        engine.update_layout(&viewport);
        let center = engine.center_coordinate().unwrap();
        let before = screen_positions(&engine, &viewport);

        engine.realign(&mut viewport);
        assert_eq!(engine.reference_coordinate(), center);
        assert!(engine.update_layout(&viewport).is_none());

        let after = screen_positions(&engine, &viewport);
        assert_eq!(
            after.keys().collect::<Vec<_>>(),
            before.keys().collect::<Vec<_>>()
        );
        for (coordinate, position) in &before {
            assert_close(after[coordinate], *position);
        }
    }
}

#[test]
fn realigned_frames_stay_near_the_surface() {
    let mut engine = engine(100.0);
    let mut viewport = phone();
    engine.update_layout(&viewport);
    let surface_center = viewport.surface_center();

    // Far more than the scroll slack if the grid never recentered
    for _ in 0..2_000 {
        viewport.scroll_by(80.0, 80.0);
        engine.update_layout(&viewport);
        engine.realign(&mut viewport);
    }

    assert!(engine.reference_coordinate().x >= 1_599);
    let (_, tile) = engine.tile_at(engine.reference_coordinate()).unwrap();
    assert!((tile.frame().center().x - surface_center.x).abs() <= 100.0);
    assert!((viewport.visible_rect().center().y - surface_center.y).abs() <= 100.0);
}

#[test]
fn zoom_round_trip_restores_grid() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..20 {
        let mut engine = engine(100.0);
        let mut viewport = phone();
        engine.update_layout(&viewport);
        viewport.scroll_by(rng.gen_range(-900.0..900.0), rng.gen_range(-900.0..900.0));
        engine.update_layout(&viewport);
        if rng.gen_bool(0.5) {
            engine.realign(&mut viewport);
        }

        let coordinates = engine.presenting_coordinates();
        let positions = screen_positions(&engine, &viewport);

        let scale = rng.gen_range(0.4..2.5);
        engine.zoom(scale, &mut viewport);
        assert!((engine.tile_size() - 100.0 * scale).abs() < 1e-9);
        engine.zoom(1.0 / scale, &mut viewport);

        assert!((engine.tile_size() - 100.0).abs() < 1e-9);
        assert_eq!(engine.presenting_coordinates(), coordinates);
        let restored = screen_positions(&engine, &viewport);
        for (coordinate, position) in &positions {
            assert_close(restored[coordinate], *position);
        }
    }
}

#[test]
fn zoom_recenters_and_rebuilds() {
    let mut engine = engine(100.0);
    let mut viewport = phone();
    engine.update_layout(&viewport);
    viewport.scroll_by(1_234.0, -987.0);
    engine.update_layout(&viewport);

    engine.zoom(0.5, &mut viewport);

    assert_eq!(Some(engine.reference_coordinate()), engine.center_coordinate());
    assert_eq!(engine.presenting_coordinates(), expected_coordinates(&engine));
    for (_, tile) in engine.tiles() {
        assert_eq!(tile.frame().size, Size::square(50.0));
    }
}

#[test]
fn evicted_tiles_are_reused_before_constructing() {
    let mut engine = engine(100.0);
    let mut viewport = phone();
    engine.update_layout(&viewport);
    let window = engine.presenting_count();

    // Jump to a disjoint window: every tile is new, then the old ones are freed.
    viewport.scroll_by(5_000.0, 0.0);
    engine.update_layout(&viewport);
    assert_eq!(engine.free_count(), window);
    let constructed = engine.constructed_count();
    let reused = engine.stats().tiles_reused;

    viewport.scroll_by(-5_000.0, 0.0);
    engine.update_layout(&viewport);

    assert_eq!(engine.constructed_count(), constructed);
    assert_eq!(engine.stats().tiles_reused, reused + window as u64);
    assert_eq!(engine.presenting_count(), window);
}

#[test]
fn stale_completion_after_rebind_changes_nothing() {
    let mut engine = engine(100.0);
    let mut viewport = phone();
    engine.update_layout(&viewport);

    // The leftmost column goes away once we scroll right by one tile.
    let bounds = engine.bounds().unwrap();
    let leaving = Coordinate::new(bounds.min_x, 0);
    let (leaving_id, _) = engine.tile_at(leaving).unwrap();
    let request = engine.loader().take(leaving).unwrap();

    // Result is already in flight when the tile is evicted and rebound.
    assert!(request.sink.complete(Ok(TileContent::new(vec![9u8; 4], 1, 1))));
    viewport.scroll_by(100.0, 0.0);
    engine.update_layout(&viewport);
    viewport.scroll_by(100.0, 0.0);
    engine.update_layout(&viewport);

    let rebound = engine.tile(leaving_id).unwrap();
    let rebound_to = rebound.coordinate();
    assert_ne!(rebound_to, Some(leaving));

    assert_eq!(engine.apply_completions(), 0);
    assert_eq!(engine.stats().stale_completions, 1);
    assert!(engine.tile(leaving_id).unwrap().content().is_none());
    assert!(engine.tiles().all(|(_, tile)| tile.content().is_none()));
}

#[test]
fn cancelled_loads_never_reach_the_engine() {
    let mut engine = engine(100.0);
    let mut viewport = phone();
    engine.update_layout(&viewport);

    let bounds = engine.bounds().unwrap();
    let leaving = Coordinate::new(bounds.min_x, bounds.min_y);
    let request = engine.loader().take(leaving).unwrap();

    viewport.scroll_by(100.0, 100.0);
    engine.update_layout(&viewport);

    assert!(request.sink.is_cancelled());
    assert!(!request.sink.complete(Ok(TileContent::new(vec![1u8; 4], 1, 1))));
    assert_eq!(engine.apply_completions(), 0);
    assert_eq!(engine.stats().stale_completions, 0);
}
