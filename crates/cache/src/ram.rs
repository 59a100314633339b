//! In-memory content cache with LRU eviction
//!
//! Holds decoded tile images keyed by coordinate key. An entry only answers a
//! request if it is at least as large as the size the tile will be drawn at;
//! a smaller entry reports the source variant it came from so the same
//! picture can be fetched again at a higher resolution. Entries the source
//! marked complete answer requests of any size.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tilegrid_core::{CancellationToken, TileContent};

/// A cached image plus the source variant it was produced from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedContent {
    pub content: TileContent,
    /// Source-specific identifier of the picture, if the source has one
    pub variant: Option<String>,
    /// The source has no larger rendition of this picture
    pub complete: bool,
}

impl CachedContent {
    pub fn new(content: TileContent, variant: Option<String>) -> Self {
        Self {
            content,
            variant,
            complete: false,
        }
    }

    /// Mark the entry as the largest rendition the source can produce
    pub fn completed(mut self) -> Self {
        self.complete = true;
        self
    }

    /// Whether this entry can be drawn at `pixel_size` without refetching
    pub fn satisfies(&self, pixel_size: u32) -> bool {
        self.complete || self.content.min_side() >= pixel_size
    }

    pub fn memory_size(&self) -> usize {
        self.content.byte_size()
    }
}

/// Outcome of [`ContentCache::lookup`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Hit(TileContent),
    /// Present but smaller than requested; refetch using `variant`
    Undersized { variant: Option<String> },
    Miss,
}

/// Statistics about cache usage
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStats {
    /// Number of entries currently in cache
    pub entry_count: usize,

    /// Bytes used by cached pixels
    pub memory_used: usize,

    /// Byte budget
    pub memory_limit: usize,

    pub hits: u64,

    /// Lookups that found nothing usable, undersized entries included
    pub misses: u64,

    /// Lookups that found an entry too small for the request
    pub undersized: u64,

    /// Entries evicted due to memory pressure
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Calculate memory utilization (0.0 to 1.0)
    pub fn memory_utilization(&self) -> f64 {
        if self.memory_limit == 0 {
            0.0
        } else {
            self.memory_used as f64 / self.memory_limit as f64
        }
    }
}

struct CacheState {
    entries: HashMap<String, CachedContent>,

    /// Most recently used at back, least recently used at front
    lru_queue: VecDeque<String>,

    memory_used: usize,
    memory_limit: usize,
    stats: CacheStats,
}

impl CacheState {
    fn new(memory_limit: usize) -> Self {
        Self {
            entries: HashMap::new(),
            lru_queue: VecDeque::new(),
            memory_used: 0,
            memory_limit,
            stats: CacheStats {
                memory_limit,
                ..Default::default()
            },
        }
    }

    fn touch(&mut self, key: &str) {
        self.lru_queue.retain(|k| k != key);
        self.lru_queue.push_back(key.to_string());
    }

    fn take(&mut self, key: &str) -> Option<CachedContent> {
        let entry = self.entries.remove(key)?;
        self.memory_used = self.memory_used.saturating_sub(entry.memory_size());
        self.lru_queue.retain(|k| k != key);
        self.sync_stats();
        Some(entry)
    }

    fn evict_lru(&mut self) -> bool {
        let Some(key) = self.lru_queue.pop_front() else {
            return false;
        };
        if let Some(entry) = self.entries.remove(&key) {
            self.memory_used = self.memory_used.saturating_sub(entry.memory_size());
            self.stats.evictions += 1;
            tracing::trace!(%key, bytes = entry.memory_size(), "evicted cached content");
        }
        self.sync_stats();
        true
    }

    /// Evict until `required` more bytes fit under the limit
    fn evict_to_fit(&mut self, required: usize) {
        while self.memory_used + required > self.memory_limit && !self.entries.is_empty() {
            if !self.evict_lru() {
                break;
            }
        }
    }

    fn sync_stats(&mut self) {
        self.stats.entry_count = self.entries.len();
        self.stats.memory_used = self.memory_used;
    }

    fn insert(&mut self, key: &str, entry: CachedContent) {
        let size = entry.memory_size();
        self.take(key);
        if size > self.memory_limit {
            tracing::debug!(key, bytes = size, "content larger than cache budget; not cached");
            return;
        }

        self.evict_to_fit(size);
        self.memory_used += size;
        self.entries.insert(key.to_string(), entry);
        self.touch(key);
        self.sync_stats();
    }
}

/// Thread-safe LRU cache of tile content
///
/// # Example
///
/// ```
/// use tilegrid_cache::{CacheLookup, ContentCache};
/// use tilegrid_core::TileContent;
///
/// let cache = ContentCache::with_mb_limit(16);
/// let content = TileContent::new(vec![0u8; 64 * 64 * 4], 64, 64);
/// cache.put("3,-2", content.clone(), Some("17".to_string()));
///
/// assert_eq!(cache.lookup("3,-2", 64), CacheLookup::Hit(content));
/// assert_eq!(
///     cache.lookup("3,-2", 128),
///     CacheLookup::Undersized { variant: Some("17".to_string()) }
/// );
/// ```
pub struct ContentCache {
    state: Mutex<CacheState>,
}

impl ContentCache {
    /// Create a cache holding at most `memory_limit` bytes of pixels
    pub fn new(memory_limit: usize) -> Self {
        Self {
            state: Mutex::new(CacheState::new(memory_limit)),
        }
    }

    /// Budget in megabytes; saturates at `usize::MAX` bytes
    pub fn with_mb_limit(megabytes: usize) -> Self {
        Self::new(megabytes.saturating_mul(1024 * 1024))
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `content` under `key`, replacing any previous entry
    ///
    /// Least recently used entries are evicted to make room. Content larger
    /// than the whole budget is not cached.
    pub fn put(&self, key: &str, content: TileContent, variant: Option<String>) {
        self.put_entry(key, CachedContent::new(content, variant));
    }

    /// Store a prepared entry under `key`, replacing any previous entry
    pub fn put_entry(&self, key: &str, entry: CachedContent) {
        self.state().insert(key, entry);
    }

    /// Store `entry` unless `token` has been cancelled
    ///
    /// The token is checked while the cache lock is held, so a fetch that is
    /// cancelled before this call never becomes visible to other lookups.
    /// Returns whether the entry was stored.
    pub fn put_unless_cancelled(
        &self,
        key: &str,
        entry: CachedContent,
        token: &CancellationToken,
    ) -> bool {
        let mut state = self.state();
        if token.is_cancelled() {
            return false;
        }
        state.insert(key, entry);
        true
    }

    /// Look up content for a tile drawn `pixel_size` pixels wide
    ///
    /// Hits and undersized entries both count as a use for LRU purposes.
    pub fn lookup(&self, key: &str, pixel_size: u32) -> CacheLookup {
        let mut state = self.state();
        let found = state
            .entries
            .get(key)
            .map(|entry| (entry.satisfies(pixel_size), entry.clone()));

        match found {
            Some((true, entry)) => {
                state.touch(key);
                state.stats.hits += 1;
                CacheLookup::Hit(entry.content)
            }
            Some((false, entry)) => {
                state.touch(key);
                state.stats.misses += 1;
                state.stats.undersized += 1;
                CacheLookup::Undersized {
                    variant: entry.variant,
                }
            }
            None => {
                state.stats.misses += 1;
                CacheLookup::Miss
            }
        }
    }

    /// Entry for `key` regardless of size, updating LRU order and stats
    pub fn get(&self, key: &str) -> Option<CachedContent> {
        let mut state = self.state();
        match state.entries.get(key).cloned() {
            Some(entry) => {
                state.touch(key);
                state.stats.hits += 1;
                Some(entry)
            }
            None => {
                state.stats.misses += 1;
                None
            }
        }
    }

    /// Check for `key` without touching LRU order or stats
    pub fn contains(&self, key: &str) -> bool {
        self.state().entries.contains_key(key)
    }

    pub fn remove(&self, key: &str) -> Option<CachedContent> {
        self.state().take(key)
    }

    pub fn clear(&self) {
        let mut state = self.state();
        state.entries.clear();
        state.lru_queue.clear();
        state.memory_used = 0;
        state.sync_stats();
    }

    pub fn stats(&self) -> CacheStats {
        self.state().stats
    }

    /// Change the byte budget, evicting if usage is now over it
    pub fn set_memory_limit(&self, new_limit: usize) {
        let mut state = self.state();
        state.memory_limit = new_limit;
        state.stats.memory_limit = new_limit;
        if state.memory_used > new_limit {
            state.evict_to_fit(0);
        }
    }

    pub fn memory_limit(&self) -> usize {
        self.state().memory_limit
    }

    pub fn memory_used(&self) -> usize {
        self.state().memory_used
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().entries.is_empty()
    }
}

impl Default for ContentCache {
    /// 64MB budget
    fn default() -> Self {
        Self::with_mb_limit(64)
    }
}
