//! Virtualized infinite tile grid
//!
//! Presents an unbounded two-dimensional grid of image tiles inside a bounded
//! scroll container. Only the tiles around the viewport are materialized and
//! they are recycled as the user scrolls. Scroll offsets stay near the
//! surface center through periodic recentering, and pinch-zoom rescales the
//! tiles in place.
//!
//! The engine is single-threaded and UI-agnostic: hosts implement
//! [`Viewport`] for their scroll container and [`ContentLoader`] for whatever
//! produces tile images.

pub mod config;
pub mod controller;
pub mod coordinate;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod loader;
pub mod pool;
pub mod tile;
pub mod viewport;

pub use config::{ConfigError, GridConfig};
pub use controller::{GridController, ZoomOutcome, ZoomPolicy};
pub use coordinate::{Coordinate, GridBounds};
pub use engine::{computed_center, visible_bounds, EngineStats, GridEngine, LayoutChange};
pub use error::{LoadError, LoadResult};
pub use geometry::{Point, Rect, Size};
pub use loader::{
    CompletionSink, ContentLoader, LoadCompletion, LoadHandle, LoadRequest, TileContent,
};
pub use pool::{Reusable, TileId, TileKind, TilePool};
pub use tile::Tile;
pub use viewport::{ScrollViewport, Viewport};

pub use tilegrid_scheduler::{CancellationToken, JobPriority};
