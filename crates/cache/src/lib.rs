//! Tile content pipeline
//!
//! An LRU cache of decoded tile images, pluggable content sources, and a
//! [`tilegrid_core::ContentLoader`] that serves the grid from cache and fetches
//! misses on a pool of worker threads.

pub mod loader;
pub mod ram;
pub mod source;

pub use loader::{CachingLoader, LoaderStats};
pub use ram::{CacheLookup, CacheStats, CachedContent, ContentCache};
pub use source::{ContentSource, FetchRequest, FetchedContent, PatternSource};
