#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure passage rules deciding how a directional step resolves.
//!
//! Every function here reads a [`NeighborSnapshot`] and returns a verdict
//! without touching actor state, so callers may probe alternatives freely.

use strata_core::{Direction, GridPos, LayerIndex, Settings, StepOutcome};
use strata_world::{MatchedTile, NeighborSnapshot};
use tracing::debug;

/// Actor state that influences passage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepFlags {
    /// The actor is diving.
    pub underwater: bool,
    /// The actor is standing on stairs.
    pub on_stairs: bool,
    /// The actor may enter and leave water.
    pub swim_allowed: bool,
    /// The actor ignores every rule.
    pub through_walls: bool,
}

/// Landing rules applied to a jump.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JumpKind {
    /// Drop over a ledge.
    Ledge,
    /// Hop off a jump tile or a forward jump request.
    Hop,
    /// Jump from land into water.
    SwimEnter,
    /// Jump from water onto land.
    SwimExit,
}

impl JumpKind {
    /// Landing rules implied by a passage verdict.
    #[must_use]
    pub fn for_outcome(outcome: StepOutcome, snapshot: &NeighborSnapshot) -> Option<Self> {
        match outcome {
            StepOutcome::RequiresLedgeJump { .. } => {
                let over_ledge = snapshot
                    .facing_tile()
                    .is_some_and(|tile| tile.tag.is_ledge());
                Some(if over_ledge { Self::Ledge } else { Self::Hop })
            }
            StepOutcome::RequiresSwimEntry { entering: true, .. } => Some(Self::SwimEnter),
            StepOutcome::RequiresSwimEntry {
                entering: false, ..
            } => Some(Self::SwimExit),
            _ => None,
        }
    }
}

/// Decides how a step in `direction` resolves.
///
/// `snapshot` must have been taken facing `direction`. `is_occupied` reports
/// whether another actor holds a cell on a layer.
pub fn can_step<F>(
    direction: Direction,
    snapshot: &NeighborSnapshot,
    flags: StepFlags,
    settings: &Settings,
    is_occupied: F,
) -> StepOutcome
where
    F: Fn(GridPos, LayerIndex) -> bool,
{
    if flags.through_walls {
        return StepOutcome::Allowed;
    }
    if snapshot.direction != direction {
        debug!(?direction, facing = ?snapshot.direction, "snapshot_direction_mismatch");
        return StepOutcome::BlockedByWall;
    }

    let source = snapshot.on_cell;
    let ascent = snapshot
        .above_facing
        .filter(|tile| tile.tile().tag.stair_descent() == Some(direction.opposite()));
    let destination = ascent.or(snapshot.facing);

    if !settings.allow_walk_behind_terrain_edges {
        let covered = snapshot.above_facing.is_some_and(|tile| {
            tile.tile().is_hideable() && !tile.tile().tag.is_stair()
        });
        if covered {
            return StepOutcome::BlockedByWall;
        }
    }

    let (Some(source), Some(destination)) = (source, destination) else {
        return StepOutcome::BlockedByWall;
    };
    let from = *source.tile();
    let to = *destination.tile();

    if is_occupied(destination.cell(), destination.layer()) {
        return StepOutcome::BlockedByEvent;
    }

    if flags.on_stairs {
        if let Some(descent) = from.tag.stair_descent() {
            if !descent.is_parallel(direction) {
                return StepOutcome::BlockedByWall;
            }
        }
    }

    if !from.allows_exit(direction) {
        return StepOutcome::BlockedByWall;
    }

    if to.tag.is_ledge() {
        return if to.allows_exit(direction) || settings.allow_jump_up_ledges {
            StepOutcome::RequiresLedgeJump { tiles: 2 }
        } else {
            StepOutcome::BlockedByWall
        };
    }

    if !to.allows_entry(direction) {
        return StepOutcome::BlockedByWall;
    }

    let layer_delta = destination.layer().get() - snapshot.layer.get();
    if layer_delta != 0 {
        let descending = layer_delta < 0 && from.tag.stair_descent() == Some(direction);
        let ascending = layer_delta > 0 && ascent.is_some();
        if !(descending || ascending) {
            return StepOutcome::BlockedByWall;
        }
        return StepOutcome::RequiresStairTransition {
            destination: destination.cell(),
            layer_delta,
        };
    }

    if from.tag.is_jump_tile() || to.tag.is_jump_tile() {
        return StepOutcome::RequiresLedgeJump { tiles: 1 };
    }

    if flags.underwater || to.tag.is_underwater() {
        return if flags.underwater && to.tag.is_underwater() {
            StepOutcome::Allowed
        } else {
            StepOutcome::BlockedByWall
        };
    }

    let entering = to.tag.is_water();
    if from.tag.is_water() != entering {
        if !(settings.allow_swimming && flags.swim_allowed) {
            return StepOutcome::BlockedByWall;
        }
        let wet = |tile: Option<MatchedTile>| tile.is_some_and(|tile| tile.tile().tag.is_water());
        if wet(snapshot.flank_left) != entering || wet(snapshot.flank_right) != entering {
            return StepOutcome::BlockedByWall;
        }
        return StepOutcome::RequiresSwimEntry { tiles: 2, entering };
    }

    StepOutcome::Allowed
}

/// Extends a step onto a staircase into a single two-cell stair move.
///
/// A plain step onto the top of a staircase descending in `direction` becomes
/// a move to its foot one layer down. An ascent onto stairs continues to the
/// landing beyond them. The extension is skipped when the far cell is missing,
/// occupied or closed; the original verdict is returned instead.
pub fn extend_stair_route<F>(
    snapshot: &NeighborSnapshot,
    outcome: StepOutcome,
    is_occupied: F,
) -> StepOutcome
where
    F: Fn(GridPos, LayerIndex) -> bool,
{
    let direction = snapshot.direction;
    let reachable = |tile: Option<MatchedTile>| -> Option<MatchedTile> {
        tile.filter(|tile| {
            tile.tile().allows_entry(direction)
                && !tile.tile().tag.is_stair()
                && !is_occupied(tile.cell(), tile.layer())
        })
    };

    match outcome {
        StepOutcome::Allowed => {
            let onto_descent = snapshot.facing.is_some_and(|tile| {
                tile.layer() == snapshot.layer && tile.tile().tag.stair_descent() == Some(direction)
            });
            if !onto_descent || snapshot.look_ahead.is_some() {
                return outcome;
            }
            match reachable(snapshot.below_look_ahead) {
                Some(foot) => StepOutcome::RequiresStairTransition {
                    destination: foot.cell(),
                    layer_delta: -1,
                },
                None => outcome,
            }
        }
        StepOutcome::RequiresStairTransition { layer_delta: 1, .. } => {
            match reachable(snapshot.above_look_ahead) {
                Some(landing) => StepOutcome::RequiresStairTransition {
                    destination: landing.cell(),
                    layer_delta: 1,
                },
                None => outcome,
            }
        }
        _ => outcome,
    }
}

/// Checks whether a jump may land on `landing`.
///
/// `over` lists the cells crossed between take-off and landing. Unless jumps
/// over objects are enabled, a crossed cell holding a solid object blocks the
/// jump.
pub fn validate_landing(
    kind: JumpKind,
    direction: Direction,
    landing: Option<&MatchedTile>,
    over: &[Option<MatchedTile>],
    settings: &Settings,
    occupied: bool,
) -> bool {
    let Some(landing) = landing else {
        return false;
    };
    let tile = landing.tile();
    if occupied
        || !tile.allows_entry(direction)
        || tile.tag.is_ledge()
        || tile.tag.is_stair()
        || tile.tag.is_underwater()
    {
        return false;
    }

    let surface_ok = match kind {
        JumpKind::Ledge | JumpKind::Hop | JumpKind::SwimExit => !tile.tag.is_water(),
        JumpKind::SwimEnter => tile.tag.is_water(),
    };
    if !surface_ok {
        return false;
    }

    if !settings.allow_jump_over_objects {
        let blocked = over.iter().flatten().any(|crossed| {
            crossed.object_match() && crossed.tile().is_solid()
        });
        if blocked {
            return false;
        }
    }
    true
}

/// Re-derives whether an actor counts as standing on stairs.
///
/// Stair art spans two cells, so facing a staircase on the travel axis that
/// the current tile lets the actor walk onto also counts.
#[must_use]
pub fn derive_on_stairs(snapshot: &NeighborSnapshot) -> bool {
    let Some(on_cell) = snapshot.on_tile() else {
        return false;
    };
    if on_cell.tag.is_stair() {
        return true;
    }
    let direction = snapshot.direction;
    let stair_ahead = |tile: Option<MatchedTile>| {
        tile.and_then(|tile| tile.tile().tag.stair_descent())
            .is_some_and(|descent| descent.is_parallel(direction))
    };
    on_cell.allows_exit(direction)
        && (stair_ahead(snapshot.facing) || stair_ahead(snapshot.above_facing))
}

/// Tile an actor talks to: the facing tile, or the one past a counter.
#[must_use]
pub fn interaction_cell(snapshot: &NeighborSnapshot) -> Option<GridPos> {
    let facing = snapshot.facing?;
    if facing.tile().is_counter() {
        return Some(snapshot.origin.step(snapshot.direction, 2));
    }
    Some(facing.cell())
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::{MapId, TerrainTag, TerrainTile};
    use strata_world::{MapBuilder, NeighborResolver, TileCache};

    #[test]
    fn mismatched_snapshot_is_rejected() {
        let mut builder = MapBuilder::new(MapId::new(1), "field");
        let ground = builder.tile("ground", TerrainTile::new(TerrainTag::Ground));
        let layer = LayerIndex::new(0);
        builder.fill_ground(layer, GridPos::new(0, 0), GridPos::new(2, 2), ground);
        let map = builder.build();
        let mut cache = TileCache::new();
        let mut resolver = NeighborResolver::new(&map, &mut cache);
        let snapshot = resolver.snapshot(GridPos::new(1, 1), layer, Direction::Up);

        let settings = Settings::default();
        assert_eq!(
            can_step(Direction::Left, &snapshot, StepFlags::default(), &settings, |_, _| false),
            StepOutcome::BlockedByWall
        );
        assert_eq!(
            can_step(Direction::Up, &snapshot, StepFlags::default(), &settings, |_, _| false),
            StepOutcome::Allowed
        );
    }
}
