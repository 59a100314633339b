//! Tile reuse pool
//!
//! Tiles live in an arena and are addressed by [`TileId`]. For every tile kind
//! the pool tracks which tiles are presenting (attached to the grid surface)
//! and which are free for reassignment. A tile is in at most one of the two
//! sets at a time; the free set is a stack so the most recently released tile
//! is handed out first.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

/// Stable handle to a tile in a [`TilePool`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId(usize);

impl TileId {
    pub fn from_index(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tile#{}", self.0)
    }
}

/// Label separating pools of different reusable types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKind(pub &'static str);

impl TileKind {
    /// The single kind the grid engine uses
    pub const GRID_TILE: TileKind = TileKind("GridTile");
}

/// Objects that can be scrubbed before going back to the free set
pub trait Reusable {
    fn prepare_for_reuse(&mut self);
}

#[derive(Debug, Default)]
struct KindPool {
    presenting: BTreeSet<TileId>,
    /// Reuse order, most recently released last
    free: Vec<TileId>,
    /// Same ids as `free`, for membership checks
    free_set: HashSet<TileId>,
}

/// Arena of reusable tiles with per-kind presenting/free bookkeeping
///
/// Single-threaded; owned by the grid engine.
#[derive(Debug)]
pub struct TilePool<T> {
    tiles: Vec<T>,
    kinds: HashMap<TileKind, KindPool>,
}

impl<T: Reusable> TilePool<T> {
    pub fn new() -> Self {
        Self {
            tiles: Vec::new(),
            kinds: HashMap::new(),
        }
    }

    /// Adopt a newly constructed tile into the arena
    ///
    /// The tile starts in neither set; the caller attaches it.
    pub fn insert(&mut self, tile: T) -> TileId {
        self.tiles.push(tile);
        TileId(self.tiles.len() - 1)
    }

    pub fn get(&self, id: TileId) -> Option<&T> {
        self.tiles.get(id.0)
    }

    pub fn get_mut(&mut self, id: TileId) -> Option<&mut T> {
        self.tiles.get_mut(id.0)
    }

    /// Total tiles ever constructed
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Mark `id` as presenting. No-op if it already is.
    pub fn attach(&mut self, id: TileId, kind: TileKind) {
        if !self.known(id, "attach") {
            return;
        }
        let pool = self.kinds.entry(kind).or_default();
        if pool.free_set.remove(&id) {
            debug_assert!(false, "{id} attached while still in the free set");
            tracing::warn!(tile = %id, "attached a free tile; removing it from the free set");
            pool.free.retain(|free| *free != id);
        }
        pool.presenting.insert(id);
    }

    /// Clear the presenting set for `kind`, returning the detached tiles
    ///
    /// Detached tiles are in neither set afterwards; the caller decides
    /// whether to release them.
    pub fn detach_all(&mut self, kind: TileKind) -> Vec<TileId> {
        match self.kinds.get_mut(&kind) {
            Some(pool) => std::mem::take(&mut pool.presenting).into_iter().collect(),
            None => Vec::new(),
        }
    }

    /// Tiles currently presenting for `kind`, in ascending id order
    pub fn presenting(&self, kind: TileKind) -> impl Iterator<Item = TileId> + '_ {
        self.kinds
            .get(&kind)
            .into_iter()
            .flat_map(|pool| pool.presenting.iter().copied())
    }

    pub fn is_presenting(&self, id: TileId, kind: TileKind) -> bool {
        self.kinds
            .get(&kind)
            .is_some_and(|pool| pool.presenting.contains(&id))
    }

    pub fn presenting_count(&self, kind: TileKind) -> usize {
        self.kinds.get(&kind).map_or(0, |pool| pool.presenting.len())
    }

    pub fn free_count(&self, kind: TileKind) -> usize {
        self.kinds.get(&kind).map_or(0, |pool| pool.free.len())
    }

    /// Pop the most recently released free tile, if any
    pub fn take_free(&mut self, kind: TileKind) -> Option<TileId> {
        let pool = self.kinds.get_mut(&kind)?;
        let id = pool.free.pop()?;
        pool.free_set.remove(&id);
        Some(id)
    }

    /// Reset `id` and push it onto the free stack for `kind`
    ///
    /// Also removes it from the presenting set if it was there. Releasing a
    /// tile that is already free is a caller bug and is ignored.
    pub fn release(&mut self, id: TileId, kind: TileKind) {
        if !self.known(id, "release") {
            return;
        }
        let pool = self.kinds.entry(kind).or_default();
        if !pool.free_set.insert(id) {
            debug_assert!(false, "{id} released twice");
            tracing::warn!(tile = %id, "ignoring release of a tile that is already free");
            return;
        }
        pool.presenting.remove(&id);
        pool.free.push(id);
        self.tiles[id.0].prepare_for_reuse();
    }

    fn known(&self, id: TileId, operation: &str) -> bool {
        let known = id.0 < self.tiles.len();
        if !known {
            debug_assert!(false, "{operation} on unknown {id}");
            tracing::warn!(tile = %id, operation, "ignoring operation on unknown tile");
        }
        known
    }
}

impl<T: Reusable> Default for TilePool<T> {
    fn default() -> Self {
        Self::new()
    }
}
