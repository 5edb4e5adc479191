//! Per-layer memoisation of resolved tiles.

use std::collections::HashMap;

use strata_core::{GridPos, LayerIndex, SubGridId, TerrainTile, TileId};

/// Result of resolving the effective tile at a cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MatchedTile {
    cell: GridPos,
    layer: LayerIndex,
    sub_grid: SubGridId,
    source_tile: TileId,
    tile_id: TileId,
    tile: TerrainTile,
}

impl MatchedTile {
    pub(crate) const fn new(
        cell: GridPos,
        layer: LayerIndex,
        sub_grid: SubGridId,
        source_tile: TileId,
        tile_id: TileId,
        tile: TerrainTile,
    ) -> Self {
        Self {
            cell,
            layer,
            sub_grid,
            source_tile,
            tile_id,
            tile,
        }
    }

    /// Cell the tile was resolved for.
    #[must_use]
    pub const fn cell(&self) -> GridPos {
        self.cell
    }

    /// Layer owning the tile.
    #[must_use]
    pub const fn layer(&self) -> LayerIndex {
        self.layer
    }

    /// Sub-grid owning the tile.
    #[must_use]
    pub const fn sub_grid(&self) -> SubGridId {
        self.sub_grid
    }

    /// Whether the match came from an object sub-grid.
    #[must_use]
    pub const fn object_match(&self) -> bool {
        self.sub_grid.is_object()
    }

    /// Palette entry stored in the map before rule substitution.
    #[must_use]
    pub const fn source_tile(&self) -> TileId {
        self.source_tile
    }

    /// Palette entry after rule substitution.
    #[must_use]
    pub const fn tile_id(&self) -> TileId {
        self.tile_id
    }

    /// Effective tile descriptor.
    #[must_use]
    pub const fn tile(&self) -> &TerrainTile {
        &self.tile
    }
}

/// Hit and miss counters of a [`TileCache`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that required a resolution.
    pub misses: u64,
    /// Entries currently stored.
    pub entries: usize,
}

/// Memoisation table keyed by (layer, cell).
///
/// Empty cells are cached as `None`. Entries are never invalidated because map
/// topology is immutable once loaded.
#[derive(Clone, Debug, Default)]
pub struct TileCache {
    layers: HashMap<LayerIndex, HashMap<GridPos, Option<MatchedTile>>>,
    hits: u64,
    misses: u64,
}

impl TileCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a cell, recording a hit or a miss.
    ///
    /// The outer `Option` is `None` on a miss; the inner one is `None` when the
    /// cell was resolved as empty.
    pub fn lookup(&mut self, layer: LayerIndex, cell: GridPos) -> Option<Option<MatchedTile>> {
        let entry = self
            .layers
            .get(&layer)
            .and_then(|cells| cells.get(&cell))
            .copied();
        if entry.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        entry
    }

    /// Stores the resolution of a cell.
    pub fn store(&mut self, layer: LayerIndex, cell: GridPos, matched: Option<MatchedTile>) {
        let _ = self.layers.entry(layer).or_default().insert(cell, matched);
    }

    /// Number of stored entries across every layer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.values().map(HashMap::len).sum()
    }

    /// Reports whether nothing has been stored yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.len(),
        }
    }
}
