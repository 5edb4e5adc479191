//! Terrain descriptions and the pure terrain classifier.

use serde::{Deserialize, Serialize};

use crate::{Direction, PrefabId, TileId};

/// Gameplay classification of a tile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerrainTag {
    /// No special role.
    #[default]
    None,
    /// Bare walkable ground.
    Ground,
    /// Short grass.
    Grass,
    /// Tall grass that rustles and hides actors.
    TallGrass,
    /// Sand that keeps footprints.
    Sand,
    /// Snow that keeps footprints.
    Snow,
    /// Shallow surface water.
    Water,
    /// Deep surface water.
    DeepWater,
    /// Water line between land and water.
    Shore,
    /// Sea floor reachable only while diving.
    Underwater,
    /// Stairs descending towards `Up`.
    StairsUp,
    /// Stairs descending towards `Down`.
    StairsDown,
    /// Stairs descending towards `Left`.
    StairsLeft,
    /// Stairs descending towards `Right`.
    StairsRight,
    /// One-way ledge jumped over in its passage direction.
    Ledge,
    /// Bridge deck spanning a lower layer.
    Bridge,
    /// Tile that launches actors into a short hop.
    JumpTile,
    /// Raised terrain surface of an upper layer.
    Cliff,
}

impl TerrainTag {
    /// Surface water an actor can swim in.
    #[must_use]
    pub const fn is_water(self) -> bool {
        matches!(self, Self::Water | Self::DeepWater)
    }

    /// Sea floor tiles.
    #[must_use]
    pub const fn is_underwater(self) -> bool {
        matches!(self, Self::Underwater)
    }

    /// Any stair variant.
    #[must_use]
    pub const fn is_stair(self) -> bool {
        self.stair_descent().is_some()
    }

    /// Direction in which walking across the stairs descends one layer.
    #[must_use]
    pub const fn stair_descent(self) -> Option<Direction> {
        match self {
            Self::StairsUp => Some(Direction::Up),
            Self::StairsDown => Some(Direction::Down),
            Self::StairsLeft => Some(Direction::Left),
            Self::StairsRight => Some(Direction::Right),
            _ => None,
        }
    }

    /// Water line tiles.
    #[must_use]
    pub const fn is_shore(self) -> bool {
        matches!(self, Self::Shore)
    }

    /// Bridge decks.
    #[must_use]
    pub const fn is_bridge(self) -> bool {
        matches!(self, Self::Bridge)
    }

    /// One-way ledges.
    #[must_use]
    pub const fn is_ledge(self) -> bool {
        matches!(self, Self::Ledge)
    }

    /// Jump tiles.
    #[must_use]
    pub const fn is_jump_tile(self) -> bool {
        matches!(self, Self::JumpTile)
    }

    /// Solid terrain that upper layers are built from.
    #[must_use]
    pub const fn is_terrain_surface(self) -> bool {
        matches!(
            self,
            Self::Ground | Self::Grass | Self::TallGrass | Self::Sand | Self::Snow | Self::Cliff
        )
    }

    /// Grass that rustles when walked through.
    #[must_use]
    pub const fn is_grass(self) -> bool {
        matches!(self, Self::Grass | Self::TallGrass)
    }

    /// Soft terrain that keeps footprints.
    #[must_use]
    pub const fn leaves_footprints(self) -> bool {
        matches!(self, Self::Sand | Self::Snow)
    }
}

bitflags::bitflags! {
    /// Edges of a tile that may be crossed, one flag per direction.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Passage: u8 {
        /// The upper edge may be crossed.
        const UP = 1 << 0;
        /// The lower edge may be crossed.
        const DOWN = 1 << 1;
        /// The left edge may be crossed.
        const LEFT = 1 << 2;
        /// The right edge may be crossed.
        const RIGHT = 1 << 3;
    }
}

impl Passage {
    /// Flag guarding the edge facing `direction`.
    #[must_use]
    pub const fn from_direction(direction: Direction) -> Self {
        match direction {
            Direction::Up => Self::UP,
            Direction::Down => Self::DOWN,
            Direction::Left => Self::LEFT,
            Direction::Right => Self::RIGHT,
        }
    }

    /// Reports whether the edge facing `direction` may be crossed.
    #[must_use]
    pub fn allows(self, direction: Direction) -> bool {
        self.contains(Self::from_direction(direction))
    }
}

bitflags::bitflags! {
    /// Presentation and interaction flags of a tile.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct TileFlags: u8 {
        /// Actors standing next to the tile cast a reflection.
        const REFLECTIVE = 1 << 0;
        /// Tall vegetation that partially hides actors.
        const BUSH = 1 << 1;
        /// Counter that can be talked across.
        const COUNTER = 1 << 2;
        /// Upper terrain that may be faded out to reveal actors behind it.
        const HIDEABLE = 1 << 3;
        /// Prefab only hidden when it also covers the cell above the viewer.
        const STRICT_HIDING = 1 << 4;
    }
}

/// Variants a rule tile resolves to depending on its neighbourhood.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RuleAlternates {
    /// Interior variant used when every checked neighbour matches.
    pub surface: Option<TileId>,
    /// Border variant used when at least one checked neighbour differs.
    pub edge: Option<TileId>,
    /// Water line variant replacing the edge where no decoration blocks it.
    pub shore: Option<TileId>,
}

/// Closed set of tile descriptor kinds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TileKind {
    /// Tile used as-is.
    #[default]
    Basic,
    /// Tile whose appearance depends on same-tag adjacency.
    Rule(RuleAlternates),
    /// Tile standing for a multi-cell prefab scene entity.
    Prefab(PrefabId),
}

/// Immutable description of a terrain tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TerrainTile {
    /// Gameplay classification.
    pub tag: TerrainTag,
    /// Crossable edges.
    pub passage: Passage,
    /// Presentation and interaction flags.
    pub flags: TileFlags,
    /// Descriptor kind.
    pub kind: TileKind,
}

impl TerrainTile {
    /// Creates a basic tile crossable on every edge.
    #[must_use]
    pub const fn new(tag: TerrainTag) -> Self {
        Self {
            tag,
            passage: Passage::all(),
            flags: TileFlags::empty(),
            kind: TileKind::Basic,
        }
    }

    /// Replaces the crossable edges.
    #[must_use]
    pub const fn with_passage(mut self, passage: Passage) -> Self {
        self.passage = passage;
        self
    }

    /// Replaces the flags.
    #[must_use]
    pub const fn with_flags(mut self, flags: TileFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Replaces the descriptor kind.
    #[must_use]
    pub const fn with_kind(mut self, kind: TileKind) -> Self {
        self.kind = kind;
        self
    }

    /// Reports whether an actor may leave the tile towards `direction`.
    #[must_use]
    pub fn allows_exit(&self, direction: Direction) -> bool {
        self.passage.allows(direction)
    }

    /// Reports whether an actor travelling in `direction` may enter the tile.
    #[must_use]
    pub fn allows_entry(&self, direction: Direction) -> bool {
        self.passage.allows(direction.opposite())
    }

    /// Reports whether no edge of the tile may be crossed.
    #[must_use]
    pub fn is_solid(&self) -> bool {
        self.passage.is_empty()
    }

    /// Reflective tile.
    #[must_use]
    pub fn is_reflective(&self) -> bool {
        self.flags.contains(TileFlags::REFLECTIVE)
    }

    /// Bush tile.
    #[must_use]
    pub fn is_bush(&self) -> bool {
        self.flags.contains(TileFlags::BUSH)
    }

    /// Counter tile.
    #[must_use]
    pub fn is_counter(&self) -> bool {
        self.flags.contains(TileFlags::COUNTER)
    }

    /// Hideable upper terrain.
    #[must_use]
    pub fn is_hideable(&self) -> bool {
        self.flags.contains(TileFlags::HIDEABLE)
    }

    /// Strictly hidden prefab.
    #[must_use]
    pub fn is_strict_hiding(&self) -> bool {
        self.flags.contains(TileFlags::STRICT_HIDING)
    }

    /// Prefab referenced by the tile, if any.
    #[must_use]
    pub const fn prefab(&self) -> Option<PrefabId> {
        match self.kind {
            TileKind::Prefab(prefab) => Some(prefab),
            _ => None,
        }
    }

    /// Rule alternates of the tile, if it is a rule tile.
    #[must_use]
    pub const fn rule(&self) -> Option<RuleAlternates> {
        match self.kind {
            TileKind::Rule(alternates) => Some(alternates),
            _ => None,
        }
    }
}
