//! Connected-region search over a single layer.

use std::collections::{HashSet, VecDeque};

use strata_core::{Direction, GridPos, LayerIndex, TerrainTile};

use crate::TerrainSource;

/// Collects the 4-connected region around `seed` whose cells hold a tile
/// satisfying `accept` in any sub-grid.
///
/// The search is a breadth-first walk bounded by the layer's occupied
/// rectangle. Malformed or missing layers, and seeds that fail `accept`, yield
/// an empty region. Cells are returned in ascending order.
#[must_use]
pub fn flood_fill<S, F>(source: &S, layer: LayerIndex, seed: GridPos, accept: F) -> Vec<GridPos>
where
    S: TerrainSource + ?Sized,
    F: Fn(GridPos, &TerrainTile) -> bool,
{
    let Some(grid) = source.layer(layer) else {
        return Vec::new();
    };
    let Some(bounds) = grid.bounds() else {
        return Vec::new();
    };

    let matches = |cell: GridPos| -> bool {
        if !bounds.contains(cell) {
            return false;
        }
        grid.stack_at(cell)
            .into_iter()
            .filter_map(|(_, id)| source.tile(id))
            .any(|tile| accept(cell, tile))
    };

    if !matches(seed) {
        return Vec::new();
    }

    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    let _ = visited.insert(seed);
    queue.push_back(seed);

    while let Some(cell) = queue.pop_front() {
        for direction in Direction::ALL {
            let neighbor = cell.neighbor(direction);
            if visited.contains(&neighbor) || !matches(neighbor) {
                continue;
            }
            let _ = visited.insert(neighbor);
            queue.push_back(neighbor);
        }
    }

    let mut region: Vec<GridPos> = visited.into_iter().collect();
    region.sort_unstable();
    region
}
