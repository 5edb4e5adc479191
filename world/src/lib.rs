#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative layered map data for the Strata movement engine.
//!
//! A [`LayeredMap`] stacks [`GridLayer`] values by height. Each layer owns one
//! ground [`SubGrid`] and any number of object sub-grids drawn above it. Maps
//! never change after construction; the [`NeighborResolver`] memoises tile
//! lookups in a [`TileCache`] owned next to the map by the [`MapRegistry`].

mod cache;
mod definition;
mod flood;
mod resolver;

use std::collections::{BTreeMap, HashMap};

use strata_core::{Direction, GridPos, LayerIndex, MapId, SubGridId, TerrainTile, TileId};
use tracing::info;

pub use cache::{CacheStats, MatchedTile, TileCache};
pub use definition::{
    LayerDefinition, MapBuilder, MapDefinition, MapError, SpawnDefinition, TileDefinition,
    TileFlagName, TileKindDefinition,
};
pub use flood::flood_fill;
pub use resolver::{NeighborResolver, NeighborSnapshot, ResolveOptions};

/// Read-only access to terrain data consumed by the resolver and flood fill.
pub trait TerrainSource {
    /// Looks up a tile descriptor in the palette.
    fn tile(&self, id: TileId) -> Option<&TerrainTile>;

    /// Looks up the layer stored at a height index.
    fn layer(&self, index: LayerIndex) -> Option<&GridLayer>;

    /// Every layer height ordered from lowest to highest.
    fn layer_indices(&self) -> Vec<LayerIndex>;
}

/// Inclusive rectangle of cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GridBounds {
    min: GridPos,
    max: GridPos,
}

impl GridBounds {
    /// Creates bounds spanning the two provided corners.
    #[must_use]
    pub fn new(a: GridPos, b: GridPos) -> Self {
        Self {
            min: GridPos::new(a.x().min(b.x()), a.y().min(b.y())),
            max: GridPos::new(a.x().max(b.x()), a.y().max(b.y())),
        }
    }

    /// Lowest corner.
    #[must_use]
    pub const fn min(&self) -> GridPos {
        self.min
    }

    /// Highest corner.
    #[must_use]
    pub const fn max(&self) -> GridPos {
        self.max
    }

    /// Reports whether the cell lies inside the bounds.
    #[must_use]
    pub const fn contains(&self, cell: GridPos) -> bool {
        cell.x() >= self.min.x()
            && cell.x() <= self.max.x()
            && cell.y() >= self.min.y()
            && cell.y() <= self.max.y()
    }

    /// Bounds grown to include the provided cell.
    #[must_use]
    pub fn including(self, cell: GridPos) -> Self {
        Self::new(
            GridPos::new(self.min.x().min(cell.x()), self.min.y().min(cell.y())),
            GridPos::new(self.max.x().max(cell.x()), self.max.y().max(cell.y())),
        )
    }
}

/// Sparse grid of tile references.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubGrid {
    id: SubGridId,
    cells: HashMap<GridPos, TileId>,
}

impl SubGrid {
    /// Creates an empty sub-grid.
    #[must_use]
    pub fn new(id: SubGridId) -> Self {
        Self {
            id,
            cells: HashMap::new(),
        }
    }

    /// Identifier of the sub-grid inside its layer.
    #[must_use]
    pub const fn id(&self) -> SubGridId {
        self.id
    }

    /// Tile stored at the provided cell.
    #[must_use]
    pub fn get(&self, cell: GridPos) -> Option<TileId> {
        self.cells.get(&cell).copied()
    }

    /// Number of occupied cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Reports whether no cell is occupied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Iterates over occupied cells in arbitrary order.
    pub fn cells(&self) -> impl Iterator<Item = (GridPos, TileId)> + '_ {
        self.cells.iter().map(|(cell, tile)| (*cell, *tile))
    }

    fn insert(&mut self, cell: GridPos, tile: TileId) -> Option<TileId> {
        self.cells.insert(cell, tile)
    }
}

/// A horizontal slice of the world at a fixed height.
///
/// Object sub-grids are stored bottom to top and searched top to bottom. A
/// layer without a ground sub-grid is malformed and resolves to nothing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GridLayer {
    index: LayerIndex,
    ground: Option<SubGrid>,
    objects: Vec<SubGrid>,
    bounds: Option<GridBounds>,
}

impl GridLayer {
    /// Creates an empty, well-formed layer.
    #[must_use]
    pub fn new(index: LayerIndex) -> Self {
        Self {
            index,
            ground: Some(SubGrid::new(SubGridId::Ground)),
            objects: Vec::new(),
            bounds: None,
        }
    }

    /// Creates a layer that lacks its ground sub-grid.
    #[must_use]
    pub fn without_ground(index: LayerIndex) -> Self {
        Self {
            ground: None,
            ..Self::new(index)
        }
    }

    /// Height index of the layer.
    #[must_use]
    pub const fn index(&self) -> LayerIndex {
        self.index
    }

    /// Reports whether the layer lacks its ground sub-grid.
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        self.ground.is_none()
    }

    /// Ground sub-grid, if present.
    #[must_use]
    pub fn ground(&self) -> Option<&SubGrid> {
        self.ground.as_ref()
    }

    /// Object sub-grids ordered bottom to top.
    #[must_use]
    pub fn objects(&self) -> &[SubGrid] {
        &self.objects
    }

    /// Looks up a sub-grid by identifier.
    #[must_use]
    pub fn sub_grid(&self, id: SubGridId) -> Option<&SubGrid> {
        match id {
            SubGridId::Ground => self.ground.as_ref(),
            SubGridId::Object(index) => self.objects.get(usize::from(index)),
        }
    }

    /// Smallest rectangle covering every occupied cell.
    #[must_use]
    pub const fn bounds(&self) -> Option<GridBounds> {
        self.bounds
    }

    /// Topmost tile at the cell: object sub-grids from the top, then ground.
    #[must_use]
    pub fn top_match(&self, cell: GridPos) -> Option<(SubGridId, TileId)> {
        let ground = self.ground.as_ref()?;
        self.objects
            .iter()
            .rev()
            .chain(std::iter::once(ground))
            .find_map(|grid| grid.get(cell).map(|tile| (grid.id(), tile)))
    }

    /// Every tile stacked at the cell, topmost first.
    #[must_use]
    pub fn stack_at(&self, cell: GridPos) -> Vec<(SubGridId, TileId)> {
        let Some(ground) = self.ground.as_ref() else {
            return Vec::new();
        };
        self.objects
            .iter()
            .rev()
            .chain(std::iter::once(ground))
            .filter_map(|grid| grid.get(cell).map(|tile| (grid.id(), tile)))
            .collect()
    }

    /// Stores a tile, creating object sub-grids up to the requested index.
    ///
    /// Ground writes into a malformed layer are ignored.
    pub(crate) fn place(&mut self, sub_grid: SubGridId, cell: GridPos, tile: TileId) {
        let grid = match sub_grid {
            SubGridId::Ground => match self.ground.as_mut() {
                Some(ground) => ground,
                None => return,
            },
            SubGridId::Object(index) => {
                let index = usize::from(index);
                while self.objects.len() <= index {
                    let next = u8::try_from(self.objects.len()).unwrap_or(u8::MAX);
                    self.objects.push(SubGrid::new(SubGridId::Object(next)));
                }
                &mut self.objects[index]
            }
        };
        let _ = grid.insert(cell, tile);
        self.bounds = Some(match self.bounds {
            Some(bounds) => bounds.including(cell),
            None => GridBounds::new(cell, cell),
        });
    }

    pub(crate) fn drop_ground(&mut self) {
        self.ground = None;
    }
}

/// Where actors enter a map.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Spawn {
    /// Spawn cell.
    pub cell: GridPos,
    /// Spawn layer.
    pub layer: LayerIndex,
    /// Initial facing.
    pub facing: Direction,
}

/// A complete map: tile palette plus layers ordered by height.
#[derive(Clone, Debug)]
pub struct LayeredMap {
    id: MapId,
    name: String,
    palette: Vec<TerrainTile>,
    tile_names: Vec<String>,
    layers: BTreeMap<LayerIndex, GridLayer>,
    spawn: Option<Spawn>,
}

impl LayeredMap {
    pub(crate) fn from_parts(
        id: MapId,
        name: String,
        palette: Vec<TerrainTile>,
        tile_names: Vec<String>,
        layers: BTreeMap<LayerIndex, GridLayer>,
        spawn: Option<Spawn>,
    ) -> Self {
        Self {
            id,
            name,
            palette,
            tile_names,
            layers,
            spawn,
        }
    }

    /// Identifier of the map.
    #[must_use]
    pub const fn id(&self) -> MapId {
        self.id
    }

    /// Display name of the map.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name registered for a palette entry.
    #[must_use]
    pub fn tile_name(&self, id: TileId) -> Option<&str> {
        let index = usize::try_from(id.get()).ok()?;
        self.tile_names.get(index).map(String::as_str)
    }

    /// Spawn point declared by the map.
    #[must_use]
    pub const fn spawn(&self) -> Option<Spawn> {
        self.spawn
    }

    /// Iterates over layers from lowest to highest.
    pub fn layers(&self) -> impl Iterator<Item = &GridLayer> + '_ {
        self.layers.values()
    }
}

impl TerrainSource for LayeredMap {
    fn tile(&self, id: TileId) -> Option<&TerrainTile> {
        let index = usize::try_from(id.get()).ok()?;
        self.palette.get(index)
    }

    fn layer(&self, index: LayerIndex) -> Option<&GridLayer> {
        self.layers.get(&index)
    }

    fn layer_indices(&self) -> Vec<LayerIndex> {
        self.layers.keys().copied().collect()
    }
}

#[derive(Debug)]
struct MapEntry {
    map: LayeredMap,
    cache: TileCache,
}

/// Explicit registry of loaded maps, each paired with its tile cache.
#[derive(Debug, Default)]
pub struct MapRegistry {
    maps: BTreeMap<MapId, MapEntry>,
}

impl MapRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a map, rejecting duplicate identifiers.
    pub fn insert(&mut self, map: LayeredMap) -> Result<(), MapError> {
        let id = map.id();
        if self.maps.contains_key(&id) {
            return Err(MapError::DuplicateMap { id: id.get() });
        }
        info!(map = id.get(), name = map.name(), layers = map.layers.len(), "map_registered");
        let _ = self.maps.insert(
            id,
            MapEntry {
                map,
                cache: TileCache::new(),
            },
        );
        Ok(())
    }

    /// Looks up a registered map.
    #[must_use]
    pub fn map(&self, id: MapId) -> Option<&LayeredMap> {
        self.maps.get(&id).map(|entry| &entry.map)
    }

    /// Resolver bound to the map and its cache.
    #[must_use]
    pub fn resolver(&mut self, id: MapId) -> Option<NeighborResolver<'_, LayeredMap>> {
        let entry = self.maps.get_mut(&id)?;
        Some(NeighborResolver::new(&entry.map, &mut entry.cache))
    }

    /// Cache statistics recorded for a map.
    #[must_use]
    pub fn cache_stats(&self, id: MapId) -> Option<CacheStats> {
        self.maps.get(&id).map(|entry| entry.cache.stats())
    }

    /// Identifiers of every registered map in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<MapId> {
        self.maps.keys().copied().collect()
    }

    /// Number of registered maps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.maps.len()
    }

    /// Reports whether no map is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::TerrainTag;

    fn sample_layer() -> GridLayer {
        let mut layer = GridLayer::new(LayerIndex::new(0));
        layer.place(SubGridId::Ground, GridPos::new(0, 0), TileId::new(0));
        layer.place(SubGridId::Ground, GridPos::new(1, 0), TileId::new(0));
        layer.place(SubGridId::Object(1), GridPos::new(1, 0), TileId::new(2));
        layer.place(SubGridId::Object(0), GridPos::new(1, 0), TileId::new(1));
        layer
    }

    #[test]
    fn top_match_prefers_highest_object() {
        let layer = sample_layer();
        assert_eq!(
            layer.top_match(GridPos::new(1, 0)),
            Some((SubGridId::Object(1), TileId::new(2)))
        );
        assert_eq!(
            layer.top_match(GridPos::new(0, 0)),
            Some((SubGridId::Ground, TileId::new(0)))
        );
        assert_eq!(layer.top_match(GridPos::new(5, 5)), None);
        assert_eq!(layer.objects().len(), 2);
    }

    #[test]
    fn stack_lists_topmost_first() {
        let layer = sample_layer();
        let stack = layer.stack_at(GridPos::new(1, 0));
        assert_eq!(
            stack,
            vec![
                (SubGridId::Object(1), TileId::new(2)),
                (SubGridId::Object(0), TileId::new(1)),
                (SubGridId::Ground, TileId::new(0)),
            ]
        );
    }

    #[test]
    fn malformed_layer_resolves_nothing() {
        let mut layer = sample_layer();
        layer.drop_ground();
        assert!(layer.is_malformed());
        assert_eq!(layer.top_match(GridPos::new(1, 0)), None);
        assert!(layer.stack_at(GridPos::new(1, 0)).is_empty());
    }

    #[test]
    fn bounds_track_every_write() {
        let layer = sample_layer();
        let bounds = layer.bounds().expect("bounds");
        assert_eq!(bounds.min(), GridPos::new(0, 0));
        assert_eq!(bounds.max(), GridPos::new(1, 0));
        assert!(!bounds.contains(GridPos::new(2, 0)));
    }

    #[test]
    fn registry_rejects_duplicate_ids() {
        let mut builder = MapBuilder::new(MapId::new(7), "twice");
        let _ = builder.tile("ground", TerrainTile::new(TerrainTag::Ground));
        let mut registry = MapRegistry::new();
        registry.insert(builder.clone().build()).expect("first insert");
        let error = registry.insert(builder.build()).expect_err("duplicate");
        assert!(matches!(error, MapError::DuplicateMap { id: 7 }));
        assert_eq!(registry.len(), 1);
    }
}
