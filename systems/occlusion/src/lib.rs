#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Occlusion tracker fading bridges, upper terrain and prefabs that cover the
//! viewer.
//!
//! Each category follows the same cycle: find the tile that covers the viewer,
//! expand it into its connected region with a flood fill, fade that region and
//! restore it once the viewer leaves. Regions are cached by their anchor cell
//! so returning under the same bridge reuses the earlier search.

use std::{
    collections::{BTreeMap, BTreeSet},
    rc::Rc,
};

use strata_core::{
    Direction, Event, GridPos, LayerIndex, PrefabId, Settings, TerrainTag, TerrainTile,
};
use strata_world::{flood_fill, NeighborResolver, ResolveOptions, TerrainSource};
use tracing::debug;

/// Categories whose occlusion is tracked independently.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OcclusionCategory {
    /// Bridge decks above the viewer.
    Bridge,
    /// Upper terrain in front of the viewer.
    Terrain,
    /// Prefab scene entities covering the viewer.
    Prefab,
}

/// Occlusion flags observed for the viewer after an update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OcclusionReport {
    /// A bridge deck covers the viewer.
    pub under_bridge: bool,
    /// Upper terrain covers the viewer.
    pub behind_upper_layer: bool,
    /// A prefab covers the viewer.
    pub behind_prefab: bool,
}

#[derive(Debug, PartialEq, Eq)]
struct Region {
    layer: LayerIndex,
    tag: TerrainTag,
    ceiling: Option<i32>,
    cells: BTreeSet<GridPos>,
}

impl Region {
    fn covers(
        &self,
        layer: LayerIndex,
        cell: GridPos,
        tag: TerrainTag,
        ceiling: Option<i32>,
    ) -> bool {
        self.layer == layer
            && self.tag == tag
            && self.ceiling == ceiling
            && self.cells.contains(&cell)
    }
}

#[derive(Debug)]
struct RegionTracker {
    category: OcclusionCategory,
    current: Option<Rc<Region>>,
    regions: BTreeMap<(LayerIndex, GridPos), Rc<Region>>,
}

impl RegionTracker {
    fn new(category: OcclusionCategory) -> Self {
        Self {
            category,
            current: None,
            regions: BTreeMap::new(),
        }
    }

    /// Hides the region grown from `anchor`, or restores the current one when
    /// there is no anchor.
    ///
    /// A region is only reused for an anchor with the same row ceiling.
    fn apply<S, F>(
        &mut self,
        source: &S,
        anchor: Option<(LayerIndex, GridPos, TerrainTag)>,
        ceiling: Option<i32>,
        accept: F,
        alpha: f32,
        out: &mut Vec<Event>,
    ) -> bool
    where
        S: TerrainSource + ?Sized,
        F: Fn(GridPos, &TerrainTile) -> bool,
    {
        let Some((layer, cell, tag)) = anchor else {
            self.restore(source, out);
            return false;
        };

        if let Some(current) = &self.current {
            if current.covers(layer, cell, tag, ceiling) {
                return true;
            }
        }

        let cached = self
            .regions
            .get(&(layer, cell))
            .filter(|region| region.covers(layer, cell, tag, ceiling))
            .or_else(|| {
                self.regions
                    .values()
                    .find(|region| region.covers(layer, cell, tag, ceiling))
            })
            .cloned();
        let region = match cached {
            Some(region) => region,
            None => {
                let cells: BTreeSet<GridPos> =
                    flood_fill(source, layer, cell, accept).into_iter().collect();
                debug!(
                    category = ?self.category,
                    layer = layer.get(),
                    ?cell,
                    tiles = cells.len(),
                    "occlusion_region_filled"
                );
                let region = Rc::new(Region {
                    layer,
                    tag,
                    ceiling,
                    cells,
                });
                let _ = self.regions.insert((layer, cell), Rc::clone(&region));
                region
            }
        };

        if self
            .current
            .as_ref()
            .is_some_and(|current| Rc::ptr_eq(current, &region))
        {
            return true;
        }

        self.restore(source, out);
        fade_region(source, &region, alpha, out);
        self.current = Some(region);
        true
    }

    fn restore<S: TerrainSource + ?Sized>(&mut self, source: &S, out: &mut Vec<Event>) {
        let Some(region) = self.current.take() else {
            return;
        };
        debug!(category = ?self.category, tiles = region.cells.len(), "occlusion_restored");
        let Some(grid) = source.layer(region.layer) else {
            return;
        };
        for cell in &region.cells {
            for (sub_grid, _) in grid.stack_at(*cell) {
                out.push(Event::TileVisibility {
                    layer: region.layer,
                    cell: *cell,
                    sub_grid,
                    alpha: 1.0,
                });
            }
        }
    }

    fn hidden(&self) -> Vec<GridPos> {
        self.current
            .as_ref()
            .map(|region| region.cells.iter().copied().collect())
            .unwrap_or_default()
    }
}

/// Fades the topmost tile of every cell and fully hides the tiles beneath it.
fn fade_region<S: TerrainSource + ?Sized>(
    source: &S,
    region: &Region,
    alpha: f32,
    out: &mut Vec<Event>,
) {
    let Some(grid) = source.layer(region.layer) else {
        return;
    };
    for cell in &region.cells {
        for (depth, (sub_grid, _)) in grid.stack_at(*cell).into_iter().enumerate() {
            out.push(Event::TileVisibility {
                layer: region.layer,
                cell: *cell,
                sub_grid,
                alpha: if depth == 0 { alpha } else { 0.0 },
            });
        }
    }
}

#[derive(Debug, Default)]
struct PrefabTracker {
    current: Option<PrefabId>,
}

impl PrefabTracker {
    fn apply(&mut self, blocking: Option<PrefabId>, alpha: f32, out: &mut Vec<Event>) -> bool {
        if self.current == blocking {
            return blocking.is_some();
        }
        if let Some(previous) = self.current.take() {
            out.push(Event::PrefabVisibility {
                prefab: previous,
                alpha: 1.0,
            });
        }
        if let Some(prefab) = blocking {
            debug!(prefab = prefab.get(), "prefab_hidden");
            out.push(Event::PrefabVisibility { prefab, alpha });
        }
        self.current = blocking;
        blocking.is_some()
    }
}

/// Occlusion state of one map.
#[derive(Debug)]
pub struct Occlusion {
    bridge: RegionTracker,
    terrain: RegionTracker,
    prefab: PrefabTracker,
}

impl Default for Occlusion {
    fn default() -> Self {
        Self::new()
    }
}

impl Occlusion {
    /// Creates a tracker with nothing hidden.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bridge: RegionTracker::new(OcclusionCategory::Bridge),
            terrain: RegionTracker::new(OcclusionCategory::Terrain),
            prefab: PrefabTracker::default(),
        }
    }

    /// Re-evaluates all three categories for a viewer.
    pub fn update<S>(
        &mut self,
        resolver: &mut NeighborResolver<'_, S>,
        viewer: GridPos,
        layer: LayerIndex,
        settings: &Settings,
        out: &mut Vec<Event>,
    ) -> OcclusionReport
    where
        S: TerrainSource + ?Sized,
    {
        OcclusionReport {
            under_bridge: self.update_bridge(resolver, viewer, layer, settings, out),
            behind_upper_layer: self.update_terrain(resolver, viewer, layer, settings, out),
            behind_prefab: self.update_prefab(resolver.source(), viewer, layer, settings, out),
        }
    }

    /// Hides the bridge spanning the viewer's cell on the layer above.
    pub fn update_bridge<S>(
        &mut self,
        resolver: &mut NeighborResolver<'_, S>,
        viewer: GridPos,
        layer: LayerIndex,
        settings: &Settings,
        out: &mut Vec<Event>,
    ) -> bool
    where
        S: TerrainSource + ?Sized,
    {
        let above = layer.above();
        let anchor = if settings.see_through_bridges {
            covering_tag(resolver, above, viewer, |tile| tile.tag.is_bridge())
                .map(|tag| (above, viewer, tag))
        } else {
            None
        };
        let tag = anchor.map(|(_, _, tag)| tag);
        self.bridge.apply(
            resolver.source(),
            anchor,
            None,
            |_, tile| Some(tile.tag) == tag,
            settings.occlusion_alpha,
            out,
        )
    }

    /// Hides upper terrain covering the viewer's cell or the cell below it.
    ///
    /// The fill never climbs above the anchor's row.
    pub fn update_terrain<S>(
        &mut self,
        resolver: &mut NeighborResolver<'_, S>,
        viewer: GridPos,
        layer: LayerIndex,
        settings: &Settings,
        out: &mut Vec<Event>,
    ) -> bool
    where
        S: TerrainSource + ?Sized,
    {
        let above = layer.above();
        let anchor = if settings.see_through_terrain {
            [viewer, viewer.neighbor(Direction::Down)]
                .into_iter()
                .find_map(|cell| {
                    covering_tag(resolver, above, cell, |tile| {
                        tile.is_hideable() && tile.tag.is_terrain_surface()
                    })
                    .map(|tag| (above, cell, tag))
                })
        } else {
            None
        };
        let ceiling = anchor.map(|(_, cell, tag)| (cell.y(), tag));
        self.terrain.apply(
            resolver.source(),
            anchor,
            ceiling.map(|(row, _)| row),
            |cell, tile| {
                ceiling.is_some_and(|(row, tag)| cell.y() <= row && tile.tag == tag)
            },
            settings.occlusion_alpha,
            out,
        )
    }

    /// Hides the prefab covering the viewer.
    ///
    /// Prefabs flagged for strict hiding must also cover the cell above the
    /// viewer.
    pub fn update_prefab<S>(
        &mut self,
        source: &S,
        viewer: GridPos,
        layer: LayerIndex,
        settings: &Settings,
        out: &mut Vec<Event>,
    ) -> bool
    where
        S: TerrainSource + ?Sized,
    {
        let blocking = if settings.see_through_prefabs {
            [layer, layer.above()]
                .into_iter()
                .find_map(|candidate| blocking_prefab(source, candidate, viewer))
        } else {
            None
        };
        self.prefab.apply(blocking, settings.occlusion_alpha, out)
    }

    /// Restores everything currently hidden.
    pub fn restore_all<S>(&mut self, source: &S, out: &mut Vec<Event>)
    where
        S: TerrainSource + ?Sized,
    {
        self.bridge.restore(source, out);
        self.terrain.restore(source, out);
        let _ = self.prefab.apply(None, 1.0, out);
    }

    /// Cells of the bridge region currently hidden.
    #[must_use]
    pub fn hidden_bridge(&self) -> Vec<GridPos> {
        self.bridge.hidden()
    }

    /// Cells of the terrain region currently hidden.
    #[must_use]
    pub fn hidden_terrain(&self) -> Vec<GridPos> {
        self.terrain.hidden()
    }

    /// Prefab currently hidden.
    #[must_use]
    pub const fn hidden_prefab(&self) -> Option<PrefabId> {
        self.prefab.current
    }

    /// Number of regions remembered for a category.
    #[must_use]
    pub fn cached_regions(&self, category: OcclusionCategory) -> usize {
        match category {
            OcclusionCategory::Bridge => self.bridge.regions.len(),
            OcclusionCategory::Terrain => self.terrain.regions.len(),
            OcclusionCategory::Prefab => 0,
        }
    }
}

/// Tag of the tile at a cell matching `covers`: the resolved top tile first,
/// then anything stacked beneath it.
fn covering_tag<S, P>(
    resolver: &mut NeighborResolver<'_, S>,
    layer: LayerIndex,
    cell: GridPos,
    covers: P,
) -> Option<TerrainTag>
where
    S: TerrainSource + ?Sized,
    P: Fn(&TerrainTile) -> bool,
{
    if let Some(matched) = resolver.resolve(layer, cell, ResolveOptions::CACHED) {
        if covers(matched.tile()) {
            return Some(matched.tile().tag);
        }
    }
    let source = resolver.source();
    source
        .layer(layer)?
        .stack_at(cell)
        .into_iter()
        .filter_map(|(_, id)| source.tile(id))
        .find(|tile| covers(tile))
        .map(|tile| tile.tag)
}

fn blocking_prefab<S>(source: &S, layer: LayerIndex, viewer: GridPos) -> Option<PrefabId>
where
    S: TerrainSource + ?Sized,
{
    let prefab_tile = prefab_at(source, layer, viewer)?;
    let prefab = prefab_tile.prefab()?;
    if prefab_tile.is_strict_hiding() {
        let above = prefab_at(source, layer, viewer.neighbor(Direction::Up));
        if above.and_then(|tile| tile.prefab()) != Some(prefab) {
            return None;
        }
    }
    Some(prefab)
}

fn prefab_at<S>(source: &S, layer: LayerIndex, cell: GridPos) -> Option<TerrainTile>
where
    S: TerrainSource + ?Sized,
{
    let grid = source.layer(layer)?;
    grid.stack_at(cell)
        .into_iter()
        .filter(|(sub_grid, _)| sub_grid.is_object())
        .filter_map(|(_, id)| source.tile(id).copied())
        .find(|tile| tile.prefab().is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefab_tracker_only_reports_changes() {
        let mut tracker = PrefabTracker::default();
        let mut out = Vec::new();
        let prefab = PrefabId::new(4);

        assert!(tracker.apply(Some(prefab), 0.5, &mut out));
        assert!(tracker.apply(Some(prefab), 0.5, &mut out));
        assert_eq!(out.len(), 1);

        assert!(!tracker.apply(None, 0.5, &mut out));
        assert_eq!(
            out.last(),
            Some(&Event::PrefabVisibility {
                prefab,
                alpha: 1.0,
            })
        );
    }
}
