//! Effective tile resolution around an actor.

use strata_core::{Direction, GridPos, LayerIndex, SubGridId, TerrainTile, TileId, TileKind};
use tracing::{trace, warn};

use crate::{MatchedTile, TerrainSource, TileCache};

/// Flags controlling a single resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResolveOptions {
    /// Falls back to the layer below when the requested layer has nothing.
    pub look_below: bool,
    /// Stores fresh resolutions in the cache.
    pub write_cache: bool,
}

impl ResolveOptions {
    /// Cached lookup restricted to the requested layer.
    pub const CACHED: Self = Self {
        look_below: false,
        write_cache: true,
    };

    /// Speculative lookup that leaves the cache untouched.
    pub const SPECULATIVE: Self = Self {
        look_below: false,
        write_cache: false,
    };

    /// Same options with the look-below fallback toggled.
    #[must_use]
    pub const fn with_look_below(mut self, look_below: bool) -> Self {
        self.look_below = look_below;
        self
    }
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self::CACHED
    }
}

/// Resolved tiles around a position, captured for one query.
///
/// `facing`, `look_ahead` and `beyond` sit one, two and three cells away in
/// the facing direction. The flanks are the cells beside the facing cell. The
/// `above_*`/`below_*` fields repeat the lookups on the adjacent layers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NeighborSnapshot {
    /// Cell the snapshot was taken at.
    pub origin: GridPos,
    /// Layer the snapshot was taken on.
    pub layer: LayerIndex,
    /// Facing used for the directional offsets.
    pub direction: Direction,
    /// Tile under the actor.
    pub on_cell: Option<MatchedTile>,
    /// Neighbour towards `Up`.
    pub up: Option<MatchedTile>,
    /// Neighbour towards `Down`.
    pub down: Option<MatchedTile>,
    /// Neighbour towards `Left`.
    pub left: Option<MatchedTile>,
    /// Neighbour towards `Right`.
    pub right: Option<MatchedTile>,
    /// Diagonal neighbour up and left.
    pub up_left: Option<MatchedTile>,
    /// Diagonal neighbour up and right.
    pub up_right: Option<MatchedTile>,
    /// Diagonal neighbour down and left.
    pub down_left: Option<MatchedTile>,
    /// Diagonal neighbour down and right.
    pub down_right: Option<MatchedTile>,
    /// Cell one step ahead.
    pub facing: Option<MatchedTile>,
    /// Cell two steps ahead.
    pub look_ahead: Option<MatchedTile>,
    /// Cell three steps ahead.
    pub beyond: Option<MatchedTile>,
    /// Cell beside the facing cell, counter-clockwise of the facing.
    pub flank_left: Option<MatchedTile>,
    /// Cell beside the facing cell, clockwise of the facing.
    pub flank_right: Option<MatchedTile>,
    /// Same cell on the layer above.
    pub above: Option<MatchedTile>,
    /// Same cell on the layer below.
    pub below: Option<MatchedTile>,
    /// Facing cell on the layer above.
    pub above_facing: Option<MatchedTile>,
    /// Facing cell on the layer below.
    pub below_facing: Option<MatchedTile>,
    /// Look-ahead cell on the layer above.
    pub above_look_ahead: Option<MatchedTile>,
    /// Look-ahead cell on the layer below.
    pub below_look_ahead: Option<MatchedTile>,
}

impl NeighborSnapshot {
    /// Orthogonal neighbour in the provided direction.
    #[must_use]
    pub const fn neighbor(&self, direction: Direction) -> Option<MatchedTile> {
        match direction {
            Direction::Up => self.up,
            Direction::Down => self.down,
            Direction::Left => self.left,
            Direction::Right => self.right,
        }
    }

    /// Tile under the actor, if any.
    #[must_use]
    pub fn on_tile(&self) -> Option<&TerrainTile> {
        self.on_cell.as_ref().map(MatchedTile::tile)
    }

    /// Tile one step ahead, if any.
    #[must_use]
    pub fn facing_tile(&self) -> Option<&TerrainTile> {
        self.facing.as_ref().map(MatchedTile::tile)
    }
}

/// Resolves effective tiles against a terrain source, memoising in a cache.
#[derive(Debug)]
pub struct NeighborResolver<'a, S: ?Sized> {
    source: &'a S,
    cache: &'a mut TileCache,
}

impl<'a, S: TerrainSource + ?Sized> NeighborResolver<'a, S> {
    /// Binds a resolver to a terrain source and its cache.
    pub fn new(source: &'a S, cache: &'a mut TileCache) -> Self {
        Self { source, cache }
    }

    /// Terrain source backing the resolver.
    #[must_use]
    pub fn source(&self) -> &'a S {
        self.source
    }

    /// Cache backing the resolver.
    #[must_use]
    pub fn cache(&self) -> &TileCache {
        &*self.cache
    }

    /// Resolves the effective tile at a cell.
    ///
    /// The requested layer is searched first; with `look_below` the layer
    /// below is consulted when the requested one has nothing at the cell.
    pub fn resolve(
        &mut self,
        layer: LayerIndex,
        cell: GridPos,
        options: ResolveOptions,
    ) -> Option<MatchedTile> {
        let found = self.resolve_on(layer, cell, options.write_cache);
        if found.is_some() || !options.look_below {
            return found;
        }
        self.resolve_on(layer.below(), cell, options.write_cache)
    }

    /// Captures every tile the passage and motion rules look at.
    pub fn snapshot(
        &mut self,
        origin: GridPos,
        layer: LayerIndex,
        direction: Direction,
    ) -> NeighborSnapshot {
        let cached = ResolveOptions::CACHED;
        let on_cell = self.resolve(layer, origin, cached);
        let stair_adjacent = on_cell.is_some_and(|matched| matched.tile().tag.is_stair());
        let ahead = cached.with_look_below(stair_adjacent);

        let facing_cell = origin.neighbor(direction);
        let look_ahead_cell = origin.step(direction, 2);
        let above = layer.above();
        let below = layer.below();

        NeighborSnapshot {
            origin,
            layer,
            direction,
            on_cell,
            up: self.resolve(layer, origin.neighbor(Direction::Up), cached),
            down: self.resolve(layer, origin.neighbor(Direction::Down), cached),
            left: self.resolve(layer, origin.neighbor(Direction::Left), cached),
            right: self.resolve(layer, origin.neighbor(Direction::Right), cached),
            up_left: self.resolve(layer, origin.offset(-1, 1), cached),
            up_right: self.resolve(layer, origin.offset(1, 1), cached),
            down_left: self.resolve(layer, origin.offset(-1, -1), cached),
            down_right: self.resolve(layer, origin.offset(1, -1), cached),
            facing: self.resolve(layer, facing_cell, ahead),
            look_ahead: self.resolve(layer, look_ahead_cell, ahead),
            beyond: self.resolve(layer, origin.step(direction, 3), ahead),
            flank_left: self.resolve(
                layer,
                facing_cell.neighbor(direction.counter_clockwise()),
                ahead,
            ),
            flank_right: self.resolve(layer, facing_cell.neighbor(direction.clockwise()), ahead),
            above: self.resolve(above, origin, cached),
            below: self.resolve(below, origin, cached),
            above_facing: self.resolve(above, facing_cell, cached),
            below_facing: self.resolve(below, facing_cell, cached),
            above_look_ahead: self.resolve(above, look_ahead_cell, cached),
            below_look_ahead: self.resolve(below, look_ahead_cell, cached),
        }
    }

    fn resolve_on(&mut self, layer: LayerIndex, cell: GridPos, write: bool) -> Option<MatchedTile> {
        if let Some(cached) = self.cache.lookup(layer, cell) {
            return cached;
        }
        let matched = self.match_tile(layer, cell);
        if write {
            self.cache.store(layer, cell, matched);
        } else {
            trace!(layer = layer.get(), ?cell, "speculative_resolution");
        }
        matched
    }

    fn match_tile(&self, layer_index: LayerIndex, cell: GridPos) -> Option<MatchedTile> {
        let layer = self.source.layer(layer_index)?;
        if layer.is_malformed() {
            warn!(layer = layer_index.get(), "layer_without_ground");
            return None;
        }
        let (sub_grid, source_tile) = layer.top_match(cell)?;
        let tile = self.source.tile(source_tile)?;
        let tile_id = match tile.kind {
            TileKind::Rule(alternates) => {
                let mismatched = self.mismatched_neighbors(layer_index, sub_grid, cell, tile);
                let substitute = if mismatched.is_empty() {
                    alternates.surface
                } else if tile.tag.is_water()
                    && !mismatched
                        .iter()
                        .any(|neighbor| self.blocked_by_object(layer_index, *neighbor))
                {
                    alternates.shore.or(alternates.edge)
                } else {
                    alternates.edge
                };
                substitute.unwrap_or(source_tile)
            }
            TileKind::Basic | TileKind::Prefab(_) => source_tile,
        };
        let resolved = self.source.tile(tile_id).copied().unwrap_or(*tile);
        Some(MatchedTile::new(
            cell,
            layer_index,
            sub_grid,
            source_tile,
            tile_id,
            resolved,
        ))
    }

    /// Cells among the four cardinals and both lower corners whose tile in
    /// the same sub-grid carries a different tag.
    fn mismatched_neighbors(
        &self,
        layer_index: LayerIndex,
        sub_grid: SubGridId,
        cell: GridPos,
        tile: &TerrainTile,
    ) -> Vec<GridPos> {
        const RULE_OFFSETS: [(i32, i32); 6] = [(0, 1), (0, -1), (-1, 0), (1, 0), (-1, -1), (1, -1)];

        let grid = self
            .source
            .layer(layer_index)
            .and_then(|layer| layer.sub_grid(sub_grid));
        RULE_OFFSETS
            .iter()
            .map(|(dx, dy)| cell.offset(*dx, *dy))
            .filter(|neighbor| {
                let tag = grid
                    .and_then(|grid| grid.get(*neighbor))
                    .and_then(|id| self.source.tile(id))
                    .map(|other| other.tag);
                tag != Some(tile.tag)
            })
            .collect()
    }

    fn blocked_by_object(&self, layer_index: LayerIndex, cell: GridPos) -> bool {
        let Some(layer) = self.source.layer(layer_index) else {
            return false;
        };
        layer.objects().iter().any(|grid| {
            grid.get(cell)
                .and_then(|id: TileId| self.source.tile(id))
                .is_some_and(TerrainTile::is_solid)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MapBuilder;
    use strata_core::{MapId, Passage, RuleAlternates, TerrainTag};

    const GROUND: LayerIndex = LayerIndex::new(0);

    #[test]
    fn rule_tiles_pick_surface_inside_and_edge_on_border() {
        let mut builder = MapBuilder::new(MapId::new(1), "lake");
        let surface = builder.tile("water_surface", TerrainTile::new(TerrainTag::Water));
        let edge = builder.tile("water_edge", TerrainTile::new(TerrainTag::Water));
        let shore = builder.tile("water_shore", TerrainTile::new(TerrainTag::Shore));
        let rock = builder.tile(
            "rock",
            TerrainTile::new(TerrainTag::None).with_passage(Passage::empty()),
        );
        let water = builder.tile(
            "water",
            TerrainTile::new(TerrainTag::Water).with_kind(TileKind::Rule(RuleAlternates {
                surface: Some(surface),
                edge: Some(edge),
                shore: Some(shore),
            })),
        );
        builder.fill_ground(GROUND, GridPos::new(0, 0), GridPos::new(4, 4), water);
        builder.place_object(GROUND, 0, GridPos::new(5, 2), rock);
        let map = builder.build();
        let mut cache = TileCache::new();
        let mut resolver = NeighborResolver::new(&map, &mut cache);

        let inner = resolver
            .resolve(GROUND, GridPos::new(2, 2), ResolveOptions::CACHED)
            .expect("inner water");
        assert_eq!(inner.tile_id(), surface);
        assert_eq!(inner.source_tile(), water);

        let open_border = resolver
            .resolve(GROUND, GridPos::new(0, 2), ResolveOptions::CACHED)
            .expect("open border");
        assert_eq!(open_border.tile_id(), shore);
        assert_eq!(open_border.tile().tag, TerrainTag::Shore);

        let rocky_border = resolver
            .resolve(GROUND, GridPos::new(4, 2), ResolveOptions::CACHED)
            .expect("rocky border");
        assert_eq!(rocky_border.tile_id(), edge);
    }

    #[test]
    fn look_below_falls_back_to_lower_layer() {
        let mut builder = MapBuilder::new(MapId::new(1), "steps");
        let ground = builder.tile("ground", TerrainTile::new(TerrainTag::Ground));
        builder.place_ground(GROUND, GridPos::new(0, 0), ground);
        builder.place_ground(LayerIndex::new(1), GridPos::new(0, 1), ground);
        let map = builder.build();
        let mut cache = TileCache::new();
        let mut resolver = NeighborResolver::new(&map, &mut cache);
        let upper = LayerIndex::new(1);

        assert_eq!(
            resolver.resolve(upper, GridPos::new(0, 0), ResolveOptions::CACHED),
            None
        );
        let below = resolver
            .resolve(
                upper,
                GridPos::new(0, 0),
                ResolveOptions::CACHED.with_look_below(true),
            )
            .expect("lower tile");
        assert_eq!(below.layer(), GROUND);
    }

    #[test]
    fn repeated_resolution_is_served_from_the_cache() {
        let mut builder = MapBuilder::new(MapId::new(1), "pond");
        let ground = builder.tile("ground", TerrainTile::new(TerrainTag::Ground));
        let stairs = builder.tile("stairs", TerrainTile::new(TerrainTag::StairsDown));
        let surface = builder.tile("water_surface", TerrainTile::new(TerrainTag::Water));
        let edge = builder.tile("water_edge", TerrainTile::new(TerrainTag::Water));
        let water = builder.tile(
            "water",
            TerrainTile::new(TerrainTag::Water).with_kind(TileKind::Rule(RuleAlternates {
                surface: Some(surface),
                edge: Some(edge),
                shore: None,
            })),
        );
        let upper = LayerIndex::new(1);
        builder.fill_ground(GROUND, GridPos::new(0, 0), GridPos::new(4, 4), ground);
        builder.fill_ground(GROUND, GridPos::new(0, 0), GridPos::new(2, 2), water);
        builder.place_ground(GROUND, GridPos::new(4, 4), stairs);
        builder.place_ground(upper, GridPos::new(0, 4), ground);
        let map = builder.build();
        let mut cache = TileCache::new();
        let mut resolver = NeighborResolver::new(&map, &mut cache);

        let first = resolver.resolve(GROUND, GridPos::new(1, 1), ResolveOptions::CACHED);
        assert_eq!(first.map(|tile| tile.tile_id()), Some(surface));
        let before = resolver.cache().stats();
        let second = resolver.resolve(GROUND, GridPos::new(1, 1), ResolveOptions::CACHED);
        let after = resolver.cache().stats();
        assert_eq!(first, second);
        assert_eq!(after.hits, before.hits + 1);
        assert_eq!(after.entries, before.entries);

        let below = ResolveOptions::CACHED.with_look_below(true);
        let first = resolver.resolve(upper, GridPos::new(4, 4), below);
        assert_eq!(first.map(|tile| tile.tile().tag), Some(TerrainTag::StairsDown));
        assert_eq!(first.map(|tile| tile.layer()), Some(GROUND));
        let before = resolver.cache().stats();
        let second = resolver.resolve(upper, GridPos::new(4, 4), below);
        let after = resolver.cache().stats();
        assert_eq!(first, second);
        assert_eq!(after.hits, before.hits + 2, "empty upper cell and the stair below");
        assert_eq!(after.misses, before.misses);
        assert_eq!(after.entries, before.entries);

        let first = resolver.snapshot(GridPos::new(1, 1), GROUND, Direction::Up);
        let before = resolver.cache().stats();
        let second = resolver.snapshot(GridPos::new(1, 1), GROUND, Direction::Up);
        let after = resolver.cache().stats();
        assert_eq!(first, second);
        assert!(after.hits > before.hits);
        assert_eq!(after.misses, before.misses);
        assert_eq!(after.entries, before.entries);
    }

    #[test]
    fn speculative_resolution_leaves_cache_untouched() {
        let mut builder = MapBuilder::new(MapId::new(1), "field");
        let ground = builder.tile("ground", TerrainTile::new(TerrainTag::Ground));
        builder.place_ground(GROUND, GridPos::new(0, 0), ground);
        let map = builder.build();
        let mut cache = TileCache::new();
        {
            let mut resolver = NeighborResolver::new(&map, &mut cache);
            let _ = resolver.resolve(GROUND, GridPos::new(0, 0), ResolveOptions::SPECULATIVE);
        }
        assert!(cache.is_empty());
    }

    #[test]
    fn snapshot_reports_cross_layer_neighbours() {
        let mut builder = MapBuilder::new(MapId::new(1), "bridge");
        let ground = builder.tile("ground", TerrainTile::new(TerrainTag::Ground));
        let bridge = builder.tile("bridge", TerrainTile::new(TerrainTag::Bridge));
        builder.fill_ground(GROUND, GridPos::new(0, 0), GridPos::new(3, 3), ground);
        builder.place_ground(LayerIndex::new(1), GridPos::new(1, 2), bridge);
        let map = builder.build();
        let mut cache = TileCache::new();
        let mut resolver = NeighborResolver::new(&map, &mut cache);

        let snapshot = resolver.snapshot(GridPos::new(1, 1), GROUND, Direction::Up);
        assert_eq!(
            snapshot.above_facing.map(|tile| tile.tile().tag),
            Some(TerrainTag::Bridge)
        );
        assert_eq!(snapshot.above, None);
        assert_eq!(snapshot.look_ahead.map(|tile| tile.cell()), Some(GridPos::new(1, 3)));
        assert_eq!(snapshot.beyond, None);
        assert_eq!(snapshot.flank_left.map(|tile| tile.cell()), Some(GridPos::new(0, 2)));
        assert_eq!(snapshot.flank_right.map(|tile| tile.cell()), Some(GridPos::new(2, 2)));
        assert_eq!(snapshot.down_left.map(|tile| tile.cell()), Some(GridPos::new(0, 0)));
    }
}
