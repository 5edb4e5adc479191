#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Strata movement engine.
//!
//! This crate defines the vocabulary that connects the layered map, the pure
//! rule systems and the adapters. Adapters submit [`Command`] values describing
//! actor intents, the simulation executes them once per tick, and then
//! broadcasts [`Event`] values that rendering and effect collaborators consume.
//! Terrain descriptions and the pure terrain classifier live in [`TerrainTag`]
//! and [`TerrainTile`]; read-only configuration lives in [`Settings`].

mod settings;
mod terrain;

use std::time::Duration;

use glam::Vec2;
use serde::{Deserialize, Serialize};

pub use settings::{EffectTiming, Settings, SpeedTable};
pub use terrain::{Passage, RuleAlternates, TerrainTag, TerrainTile, TileFlags, TileKind};

/// Sorting-order distance between two consecutive height layers.
pub const SORTING_ORDER_PER_LAYER: i32 = 10;

/// Additional sorting order granted while an actor stands on stairs.
pub const STAIRS_SORTING_BONUS: i32 = 5;

/// Computes the sorting order assigned to an actor sprite.
///
/// Actors on stairs straddle two layers, so they are drawn above everything on
/// their nominal layer.
#[must_use]
pub const fn sorting_order(layer: LayerIndex, on_stairs: bool) -> i32 {
    let bonus = if on_stairs { STAIRS_SORTING_BONUS } else { 0 };
    layer.get() * SORTING_ORDER_PER_LAYER + bonus
}

/// Location of a single grid cell. `y` grows upwards.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct GridPos {
    x: i32,
    y: i32,
}

impl GridPos {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Column of the cell.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Row of the cell.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.y
    }

    /// Returns the cell displaced by the provided offsets.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Returns the cell `tiles` steps away in `direction`.
    #[must_use]
    pub const fn step(self, direction: Direction, tiles: i32) -> Self {
        let (dx, dy) = direction.delta();
        self.offset(dx * tiles, dy * tiles)
    }

    /// Returns the orthogonally adjacent cell in `direction`.
    #[must_use]
    pub const fn neighbor(self, direction: Direction) -> Self {
        self.step(direction, 1)
    }

    /// Computes the Manhattan distance between two cells.
    #[must_use]
    pub fn manhattan_distance(self, other: GridPos) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Centre of the cell in continuous grid units.
    #[must_use]
    pub fn to_vec2(self) -> Vec2 {
        Vec2::new(self.x as f32, self.y as f32)
    }

    /// Cell nearest to a continuous position.
    #[must_use]
    pub fn from_vec2_rounded(position: Vec2) -> Self {
        Self::new(position.x.round() as i32, position.y.round() as i32)
    }
}

/// Cardinal movement directions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Towards increasing `y`.
    Up,
    /// Towards decreasing `y`.
    Down,
    /// Towards decreasing `x`.
    Left,
    /// Towards increasing `x`.
    Right,
}

impl Direction {
    /// Every direction in a stable order.
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Unit cell offset of the direction.
    #[must_use]
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Self::Up => (0, 1),
            Self::Down => (0, -1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
        }
    }

    /// Direction pointing the opposite way.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    /// Direction rotated a quarter turn clockwise.
    #[must_use]
    pub const fn clockwise(self) -> Self {
        match self {
            Self::Up => Self::Right,
            Self::Right => Self::Down,
            Self::Down => Self::Left,
            Self::Left => Self::Up,
        }
    }

    /// Direction rotated a quarter turn counter-clockwise.
    #[must_use]
    pub const fn counter_clockwise(self) -> Self {
        self.clockwise().opposite()
    }

    /// Reports whether the direction runs along the `y` axis.
    #[must_use]
    pub const fn is_vertical(self) -> bool {
        matches!(self, Self::Up | Self::Down)
    }

    /// Reports whether two directions share an axis.
    #[must_use]
    pub const fn is_parallel(self, other: Direction) -> bool {
        self.is_vertical() == other.is_vertical()
    }

    /// Continuous unit vector of the direction.
    #[must_use]
    pub fn unit_vector(self) -> Vec2 {
        let (dx, dy) = self.delta();
        Vec2::new(dx as f32, dy as f32)
    }

    /// Facing angle in degrees, counter-clockwise from `Right`.
    #[must_use]
    pub const fn angle_degrees(self) -> f32 {
        match self {
            Self::Right => 0.0,
            Self::Up => 90.0,
            Self::Left => 180.0,
            Self::Down => 270.0,
        }
    }
}

/// Ordered height index of a grid layer.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct LayerIndex(i32);

impl LayerIndex {
    /// Creates a new layer index.
    #[must_use]
    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    /// Numeric height of the layer.
    #[must_use]
    pub const fn get(&self) -> i32 {
        self.0
    }

    /// Layer displaced by `delta` heights.
    #[must_use]
    pub const fn offset(self, delta: i32) -> Self {
        Self(self.0 + delta)
    }

    /// Layer directly above.
    #[must_use]
    pub const fn above(self) -> Self {
        self.offset(1)
    }

    /// Layer directly below.
    #[must_use]
    pub const fn below(self) -> Self {
        self.offset(-1)
    }
}

/// Identifier of a map held by the registry.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct MapId(u32);

impl MapId {
    /// Creates a new map identifier.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Identifier assigned to an actor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(u32);

impl ActorId {
    /// Creates a new actor identifier.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Index of a tile inside a map palette.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TileId(u32);

impl TileId {
    /// Creates a new tile identifier.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Identifier of a prefab scene entity placed on the map.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct PrefabId(u32);

impl PrefabId {
    /// Creates a new prefab identifier.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Sub-grid of a layer. Ground sorts below every object sub-grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubGridId {
    /// The single ground sub-grid.
    Ground,
    /// Object sub-grid; index zero sits directly on the ground.
    Object(u8),
}

impl SubGridId {
    /// Reports whether the sub-grid is an object sub-grid.
    #[must_use]
    pub const fn is_object(self) -> bool {
        matches!(self, Self::Object(_))
    }
}

/// Movement speed classes available to actors.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SpeedClass {
    /// Cautious pace used by scripted walkers.
    Slow,
    /// Default walking pace.
    #[default]
    Walk,
    /// Running pace.
    Run,
    /// Riding pace.
    Cycle,
}

/// Result of evaluating a single directional step against passage rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StepOutcome {
    /// Plain single-cell step.
    Allowed,
    /// Terrain or missing map data forbids the step.
    BlockedByWall,
    /// Another actor occupies the destination.
    BlockedByEvent,
    /// The step climbs or descends stairs onto another layer.
    RequiresStairTransition {
        /// Cell reached by the transition.
        destination: GridPos,
        /// Height delta applied once the actor arrives.
        layer_delta: i32,
    },
    /// The step becomes a forward jump over a ledge or off a jump tile.
    RequiresLedgeJump {
        /// Preferred jump distance in cells.
        tiles: u8,
    },
    /// The step crosses the boundary between land and water.
    RequiresSwimEntry {
        /// Preferred jump distance in cells.
        tiles: u8,
        /// `true` when entering water, `false` when leaving it.
        entering: bool,
    },
}

impl StepOutcome {
    /// Reports whether the outcome rejects the step.
    #[must_use]
    pub const fn is_blocked(self) -> bool {
        matches!(self, Self::BlockedByWall | Self::BlockedByEvent)
    }
}

/// Fire-and-forget requests sent to the effects collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EffectRequest {
    /// Rustle the grass at a cell.
    GrassRustle {
        /// Layer containing the grass.
        layer: LayerIndex,
        /// Cell containing the grass.
        cell: GridPos,
    },
    /// Leave footprints at a cell.
    Footprint {
        /// Layer containing the footprints.
        layer: LayerIndex,
        /// Cell receiving the footprints.
        cell: GridPos,
        /// Heading of the actor leaving them.
        direction: Direction,
        /// Speed class of the actor leaving them.
        speed: SpeedClass,
    },
    /// Start the shore splash animation at a cell.
    SplashStarted {
        /// Layer containing the splash.
        layer: LayerIndex,
        /// Cell containing the splash.
        cell: GridPos,
    },
    /// Stop the shore splash animation at a cell.
    SplashStopped {
        /// Layer containing the splash.
        layer: LayerIndex,
        /// Cell containing the splash.
        cell: GridPos,
    },
}

/// Commands that express all permissible simulation mutations.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    /// Places an actor on a cell, resetting its motion state.
    Place {
        /// Actor being placed.
        actor: ActorId,
        /// Destination cell.
        cell: GridPos,
        /// Destination layer.
        layer: LayerIndex,
        /// Facing after placement.
        facing: Direction,
    },
    /// Requests a single step in a direction.
    Move {
        /// Actor attempting to move.
        actor: ActorId,
        /// Direction of travel.
        direction: Direction,
    },
    /// Turns an actor in place.
    Turn {
        /// Actor turning.
        actor: ActorId,
        /// New facing.
        direction: Direction,
    },
    /// Turns an actor towards a random direction other than its current one.
    RandomTurn {
        /// Actor turning.
        actor: ActorId,
    },
    /// Changes the movement speed class of an actor.
    ChangeSpeed {
        /// Actor affected.
        actor: ActorId,
        /// New speed class.
        speed: SpeedClass,
    },
    /// Locks or unlocks the facing of an actor.
    SetDirectionLock {
        /// Actor affected.
        actor: ActorId,
        /// Whether direction changes are suppressed.
        locked: bool,
    },
    /// Reverts an in-flight step back to the previous cell.
    CancelMovement {
        /// Actor affected.
        actor: ActorId,
    },
    /// Requests a forward jump of up to `tiles` cells.
    JumpForward {
        /// Actor jumping.
        actor: ActorId,
        /// Preferred jump distance in cells.
        tiles: u8,
    },
    /// Advances the simulation clock.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
}

/// Events broadcast by the simulation after processing commands.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Event {
    /// The simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// An actor started interpolating towards a new cell.
    StepStarted {
        /// Actor moving.
        actor: ActorId,
        /// Cell the actor left.
        from: GridPos,
        /// Cell the actor is heading to.
        to: GridPos,
        /// Layer the actor will occupy once it arrives.
        layer: LayerIndex,
    },
    /// An actor started a jump.
    JumpStarted {
        /// Actor jumping.
        actor: ActorId,
        /// Take-off cell.
        from: GridPos,
        /// Landing cell.
        landing: GridPos,
        /// Distance of the jump in cells.
        tiles: u8,
    },
    /// A move request was rejected.
    MoveRejected {
        /// Actor whose request failed.
        actor: ActorId,
        /// Requested direction.
        direction: Direction,
        /// Passage verdict that caused the rejection.
        outcome: StepOutcome,
    },
    /// An actor reached its target cell.
    ActorArrived {
        /// Actor that arrived.
        actor: ActorId,
        /// Cell reached.
        cell: GridPos,
        /// Layer reached.
        layer: LayerIndex,
    },
    /// An actor applied a deferred layer change.
    LayerChanged {
        /// Actor affected.
        actor: ActorId,
        /// Layer now occupied.
        layer: LayerIndex,
    },
    /// An actor's facing changed.
    FacingChanged {
        /// Actor affected.
        actor: ActorId,
        /// New facing.
        direction: Direction,
    },
    /// Sorting order of an actor sprite changed.
    SortingOrderChanged {
        /// Actor affected.
        actor: ActorId,
        /// New sorting order.
        order: i32,
    },
    /// Opacity of a map tile changed.
    TileVisibility {
        /// Layer containing the tile.
        layer: LayerIndex,
        /// Cell containing the tile.
        cell: GridPos,
        /// Sub-grid containing the tile.
        sub_grid: SubGridId,
        /// New opacity in the range 0.0..=1.0.
        alpha: f32,
    },
    /// Opacity of a prefab scene entity changed.
    PrefabVisibility {
        /// Prefab affected.
        prefab: PrefabId,
        /// New opacity in the range 0.0..=1.0.
        alpha: f32,
    },
    /// An actor went underwater or surfaced; drives the camera tilt.
    UnderwaterChanged {
        /// Actor affected.
        actor: ActorId,
        /// Whether the actor is now underwater.
        underwater: bool,
    },
    /// An ambient effect was requested.
    EffectRequested {
        /// The request forwarded to the effects collaborator.
        request: EffectRequest,
    },
}
