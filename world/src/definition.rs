//! Serializable map definitions and programmatic map construction.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use strata_core::{
    Direction, GridPos, LayerIndex, MapId, Passage, PrefabId, RuleAlternates, SubGridId,
    TerrainTag, TerrainTile, TileFlags, TileId, TileKind,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{GridLayer, LayeredMap, Spawn};

/// Glyph that leaves a cell empty in every layer.
const EMPTY_GLYPH: char = '.';

/// Errors raised while turning a [`MapDefinition`] into a [`LayeredMap`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MapError {
    /// A legend or alternate names a tile missing from the palette.
    #[error("unknown tile `{name}`")]
    UnknownTile {
        /// Name that failed to resolve.
        name: String,
    },
    /// Two palette entries share a name.
    #[error("tile `{name}` is declared twice")]
    DuplicateTile {
        /// Repeated name.
        name: String,
    },
    /// A row uses a glyph missing from the layer legend.
    #[error("layer {layer}: glyph `{glyph}` has no legend entry")]
    UnknownGlyph {
        /// Layer height.
        layer: i32,
        /// Offending glyph.
        glyph: char,
    },
    /// A legend key is not a single character.
    #[error("layer {layer}: legend key `{key}` must be a single character")]
    InvalidLegendKey {
        /// Layer height.
        layer: i32,
        /// Offending key.
        key: String,
    },
    /// Rows of a sub-grid differ in width.
    #[error("layer {layer}: row {row} has {found} cells, expected {expected}")]
    RaggedRows {
        /// Layer height.
        layer: i32,
        /// Zero-based row index, counted from the top.
        row: usize,
        /// Width of the first row.
        expected: usize,
        /// Width of the offending row.
        found: usize,
    },
    /// Two layers share a height.
    #[error("layer {layer} is declared twice")]
    DuplicateLayer {
        /// Repeated height.
        layer: i32,
    },
    /// A registry already holds a map with this identifier.
    #[error("map {id} is already registered")]
    DuplicateMap {
        /// Repeated identifier.
        id: u32,
    },
    /// A rule alternate references a tile that cannot stand in for it.
    #[error("tile `{tile}` uses `{alternate}` as an alternate, which is itself a rule tile")]
    InvalidAlternate {
        /// Rule tile declaring the alternate.
        tile: String,
        /// Alternate that was rejected.
        alternate: String,
    },
    /// Too many object sub-grids were declared for one layer.
    #[error("layer {layer} declares more than 256 object sub-grids")]
    TooManyObjectGrids {
        /// Layer height.
        layer: i32,
    },
}

/// Named tile flag used in definitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileFlagName {
    /// See [`TileFlags::REFLECTIVE`].
    Reflective,
    /// See [`TileFlags::BUSH`].
    Bush,
    /// See [`TileFlags::COUNTER`].
    Counter,
    /// See [`TileFlags::HIDEABLE`].
    Hideable,
    /// See [`TileFlags::STRICT_HIDING`].
    StrictHiding,
}

impl TileFlagName {
    const fn flag(self) -> TileFlags {
        match self {
            Self::Reflective => TileFlags::REFLECTIVE,
            Self::Bush => TileFlags::BUSH,
            Self::Counter => TileFlags::COUNTER,
            Self::Hideable => TileFlags::HIDEABLE,
            Self::StrictHiding => TileFlags::STRICT_HIDING,
        }
    }
}

/// Descriptor kind of a palette entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TileKindDefinition {
    /// Tile used as-is.
    #[default]
    Basic,
    /// Rule tile with named alternates.
    Rule {
        /// Interior alternate.
        #[serde(default)]
        surface: Option<String>,
        /// Border alternate.
        #[serde(default)]
        edge: Option<String>,
        /// Water line alternate.
        #[serde(default)]
        shore: Option<String>,
    },
    /// Tile belonging to a prefab.
    Prefab {
        /// Prefab identifier.
        id: u32,
    },
}

/// Palette entry of a definition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileDefinition {
    /// Unique name referenced by legends and alternates.
    pub name: String,
    /// Gameplay classification.
    #[serde(default)]
    pub tag: TerrainTag,
    /// Crossable edges; every edge when omitted.
    #[serde(default = "all_directions")]
    pub passage: Vec<Direction>,
    /// Presentation and interaction flags.
    #[serde(default)]
    pub flags: Vec<TileFlagName>,
    /// Descriptor kind.
    #[serde(default)]
    pub kind: TileKindDefinition,
}

fn all_directions() -> Vec<Direction> {
    Direction::ALL.to_vec()
}

/// One layer of a definition, written as glyph rows.
///
/// Row 0 is the top row. The bottom-left glyph sits at `origin`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerDefinition {
    /// Height index.
    pub height: i32,
    /// Cell of the bottom-left glyph.
    #[serde(default)]
    pub origin: [i32; 2],
    /// Single-character glyphs mapped to tile names.
    #[serde(default)]
    pub legend: BTreeMap<String, String>,
    /// Ground rows; a layer without them is malformed.
    #[serde(default)]
    pub ground: Option<Vec<String>>,
    /// Object sub-grid rows, bottom sub-grid first.
    #[serde(default)]
    pub objects: Vec<Vec<String>>,
}

/// Spawn point of a definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnDefinition {
    /// Spawn cell.
    pub cell: [i32; 2],
    /// Spawn layer height.
    #[serde(default)]
    pub layer: i32,
    /// Initial facing.
    #[serde(default = "default_facing")]
    pub facing: Direction,
}

const fn default_facing() -> Direction {
    Direction::Down
}

/// Persisted description of a layered map.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapDefinition {
    /// Map identifier.
    pub id: u32,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Tile palette.
    #[serde(default)]
    pub tiles: Vec<TileDefinition>,
    /// Layers in any order.
    #[serde(default)]
    pub layers: Vec<LayerDefinition>,
    /// Optional spawn point.
    #[serde(default)]
    pub spawn: Option<SpawnDefinition>,
}

impl MapDefinition {
    /// Validates the definition and builds the map.
    pub fn build(&self) -> Result<LayeredMap, MapError> {
        let mut builder = MapBuilder::new(MapId::new(self.id), self.name.clone());
        let mut names: HashMap<&str, TileId> = HashMap::new();

        for tile in &self.tiles {
            let passage = tile
                .passage
                .iter()
                .fold(Passage::empty(), |acc, direction| {
                    acc | Passage::from_direction(*direction)
                });
            let flags = tile
                .flags
                .iter()
                .fold(TileFlags::empty(), |acc, flag| acc | flag.flag());
            let id = builder.tile(
                tile.name.clone(),
                TerrainTile::new(tile.tag)
                    .with_passage(passage)
                    .with_flags(flags),
            );
            if names.insert(tile.name.as_str(), id).is_some() {
                return Err(MapError::DuplicateTile {
                    name: tile.name.clone(),
                });
            }
        }

        for tile in &self.tiles {
            let kind = match &tile.kind {
                TileKindDefinition::Basic => continue,
                TileKindDefinition::Prefab { id } => TileKind::Prefab(PrefabId::new(*id)),
                TileKindDefinition::Rule {
                    surface,
                    edge,
                    shore,
                } => {
                    let lookup = |alternate: &Option<String>| -> Result<Option<TileId>, MapError> {
                        let Some(name) = alternate else {
                            return Ok(None);
                        };
                        let id = names.get(name.as_str()).copied().ok_or_else(|| {
                            MapError::UnknownTile { name: name.clone() }
                        })?;
                        let is_rule = self.tiles.iter().any(|other| {
                            other.name == *name
                                && matches!(other.kind, TileKindDefinition::Rule { .. })
                        });
                        if is_rule {
                            return Err(MapError::InvalidAlternate {
                                tile: tile.name.clone(),
                                alternate: name.clone(),
                            });
                        }
                        Ok(Some(id))
                    };
                    TileKind::Rule(RuleAlternates {
                        surface: lookup(surface)?,
                        edge: lookup(edge)?,
                        shore: lookup(shore)?,
                    })
                }
            };
            if let Some(id) = names.get(tile.name.as_str()) {
                builder.set_kind(*id, kind);
            }
        }

        let mut seen = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            if seen.contains(&layer.height) {
                return Err(MapError::DuplicateLayer {
                    layer: layer.height,
                });
            }
            seen.push(layer.height);
            load_layer(&mut builder, &names, layer)?;
        }

        if let Some(spawn) = self.spawn {
            builder.spawn(
                GridPos::new(spawn.cell[0], spawn.cell[1]),
                LayerIndex::new(spawn.layer),
                spawn.facing,
            );
        }

        Ok(builder.build())
    }
}

fn load_layer(
    builder: &mut MapBuilder,
    names: &HashMap<&str, TileId>,
    layer: &LayerDefinition,
) -> Result<(), MapError> {
    let index = LayerIndex::new(layer.height);
    let mut legend: HashMap<char, TileId> = HashMap::new();
    for (key, name) in &layer.legend {
        let mut chars = key.chars();
        let (Some(glyph), None) = (chars.next(), chars.next()) else {
            return Err(MapError::InvalidLegendKey {
                layer: layer.height,
                key: key.clone(),
            });
        };
        let id = names
            .get(name.as_str())
            .copied()
            .ok_or_else(|| MapError::UnknownTile { name: name.clone() })?;
        let _ = legend.insert(glyph, id);
    }

    let origin = GridPos::new(layer.origin[0], layer.origin[1]);
    match &layer.ground {
        Some(rows) => {
            builder.ensure_layer(index);
            for (cell, tile) in decode_rows(layer.height, origin, rows, &legend)? {
                builder.place_ground(index, cell, tile);
            }
        }
        None => {
            warn!(layer = layer.height, "layer_without_ground");
            builder.without_ground(index);
        }
    }

    for (position, rows) in layer.objects.iter().enumerate() {
        let sub_grid = u8::try_from(position).map_err(|_| MapError::TooManyObjectGrids {
            layer: layer.height,
        })?;
        for (cell, tile) in decode_rows(layer.height, origin, rows, &legend)? {
            builder.place_object(index, sub_grid, cell, tile);
        }
    }
    debug!(layer = layer.height, objects = layer.objects.len(), "layer_loaded");
    Ok(())
}

fn decode_rows(
    layer: i32,
    origin: GridPos,
    rows: &[String],
    legend: &HashMap<char, TileId>,
) -> Result<Vec<(GridPos, TileId)>, MapError> {
    let expected = rows.first().map_or(0, |row| row.chars().count());
    let height = rows.len();
    let mut cells = Vec::new();
    for (row_index, row) in rows.iter().enumerate() {
        let found = row.chars().count();
        if found != expected {
            return Err(MapError::RaggedRows {
                layer,
                row: row_index,
                expected,
                found,
            });
        }
        let y = i32::try_from(height - 1 - row_index).unwrap_or(i32::MAX);
        for (column, glyph) in row.chars().enumerate() {
            if glyph == EMPTY_GLYPH {
                continue;
            }
            let tile = legend
                .get(&glyph)
                .copied()
                .ok_or(MapError::UnknownGlyph { layer, glyph })?;
            let x = i32::try_from(column).unwrap_or(i32::MAX);
            cells.push((origin.offset(x, y), tile));
        }
    }
    Ok(cells)
}

/// Programmatic construction of a [`LayeredMap`].
#[derive(Clone, Debug)]
pub struct MapBuilder {
    id: MapId,
    name: String,
    palette: Vec<TerrainTile>,
    tile_names: Vec<String>,
    layers: BTreeMap<LayerIndex, GridLayer>,
    spawn: Option<Spawn>,
}

impl MapBuilder {
    /// Starts an empty map.
    #[must_use]
    pub fn new(id: MapId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            palette: Vec::new(),
            tile_names: Vec::new(),
            layers: BTreeMap::new(),
            spawn: None,
        }
    }

    /// Appends a palette entry and returns its identifier.
    pub fn tile(&mut self, name: impl Into<String>, tile: TerrainTile) -> TileId {
        let id = TileId::new(u32::try_from(self.palette.len()).unwrap_or(u32::MAX));
        self.palette.push(tile);
        self.tile_names.push(name.into());
        id
    }

    /// Replaces the descriptor kind of a palette entry.
    pub fn set_kind(&mut self, id: TileId, kind: TileKind) {
        let entry = usize::try_from(id.get())
            .ok()
            .and_then(|index| self.palette.get_mut(index));
        if let Some(tile) = entry {
            tile.kind = kind;
        }
    }

    /// Creates an empty layer unless one already exists at the height.
    pub fn ensure_layer(&mut self, layer: LayerIndex) {
        let _ = self.layer_mut(layer);
    }

    /// Stores a ground tile.
    pub fn place_ground(&mut self, layer: LayerIndex, cell: GridPos, tile: TileId) {
        self.layer_mut(layer).place(SubGridId::Ground, cell, tile);
    }

    /// Stores a tile in an object sub-grid.
    pub fn place_object(&mut self, layer: LayerIndex, sub_grid: u8, cell: GridPos, tile: TileId) {
        self.layer_mut(layer)
            .place(SubGridId::Object(sub_grid), cell, tile);
    }

    /// Fills the inclusive rectangle between two corners with a ground tile.
    pub fn fill_ground(&mut self, layer: LayerIndex, from: GridPos, to: GridPos, tile: TileId) {
        for y in from.y().min(to.y())..=from.y().max(to.y()) {
            for x in from.x().min(to.x())..=from.x().max(to.x()) {
                self.place_ground(layer, GridPos::new(x, y), tile);
            }
        }
    }

    /// Removes the ground sub-grid of a layer, leaving it malformed.
    pub fn without_ground(&mut self, layer: LayerIndex) {
        self.layer_mut(layer).drop_ground();
    }

    /// Declares the spawn point.
    pub fn spawn(&mut self, cell: GridPos, layer: LayerIndex, facing: Direction) {
        self.spawn = Some(Spawn {
            cell,
            layer,
            facing,
        });
    }

    /// Finishes the map.
    #[must_use]
    pub fn build(self) -> LayeredMap {
        LayeredMap::from_parts(
            self.id,
            self.name,
            self.palette,
            self.tile_names,
            self.layers,
            self.spawn,
        )
    }

    fn layer_mut(&mut self, layer: LayerIndex) -> &mut GridLayer {
        self.layers
            .entry(layer)
            .or_insert_with(|| GridLayer::new(layer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TerrainSource;

    const HARBOR: &str = r#"
id = 3
name = "harbor"

[[tiles]]
name = "sand"
tag = "sand"

[[tiles]]
name = "water"
tag = "water"
kind = { type = "rule", edge = "water_edge" }

[[tiles]]
name = "water_edge"
tag = "water"

[[tiles]]
name = "fence"
tag = "none"
passage = []
flags = ["counter"]

[[layers]]
height = 0
legend = { s = "sand", w = "water", f = "fence" }
ground = [
    "ww",
    "ss",
]
objects = [[
    "..",
    ".f",
]]

[spawn]
cell = [0, 0]
facing = "up"
"#;

    #[test]
    fn definition_rows_count_from_the_top() {
        let definition: MapDefinition = toml::from_str(HARBOR).expect("parse harbor");
        let map = definition.build().expect("build harbor");
        let layer = map.layer(LayerIndex::new(0)).expect("ground layer");

        let (_, top_left) = layer.top_match(GridPos::new(0, 1)).expect("top left");
        assert_eq!(map.tile_name(top_left), Some("water"));
        let (sub_grid, fence) = layer.top_match(GridPos::new(1, 0)).expect("fence");
        assert_eq!(sub_grid, SubGridId::Object(0));
        let fence = map.tile(fence).expect("fence tile");
        assert!(fence.is_solid());
        assert!(fence.is_counter());
        assert_eq!(
            map.spawn().map(|spawn| spawn.facing),
            Some(Direction::Up)
        );
    }

    #[test]
    fn rule_alternates_must_exist() {
        let mut definition: MapDefinition = toml::from_str(HARBOR).expect("parse harbor");
        definition.tiles[1].kind = TileKindDefinition::Rule {
            surface: Some("missing".to_string()),
            edge: None,
            shore: None,
        };
        assert_eq!(
            definition.build().map(|_| ()),
            Err(MapError::UnknownTile {
                name: "missing".to_string()
            })
        );
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let mut definition: MapDefinition = toml::from_str(HARBOR).expect("parse harbor");
        definition.layers[0].ground = Some(vec!["ww".to_string(), "s".to_string()]);
        assert!(matches!(
            definition.build(),
            Err(MapError::RaggedRows {
                layer: 0,
                row: 1,
                expected: 2,
                found: 1,
            })
        ));
    }

    #[test]
    fn missing_ground_degrades_to_malformed_layer() {
        let mut definition: MapDefinition = toml::from_str(HARBOR).expect("parse harbor");
        definition.layers[0].ground = None;
        let map = definition.build().expect("malformed layers still load");
        let layer = map.layer(LayerIndex::new(0)).expect("layer");
        assert!(layer.is_malformed());
        assert_eq!(layer.top_match(GridPos::new(1, 0)), None);
    }

    #[test]
    fn duplicate_layers_are_rejected() {
        let mut definition: MapDefinition = toml::from_str(HARBOR).expect("parse harbor");
        let copy = definition.layers[0].clone();
        definition.layers.push(copy);
        assert_eq!(
            definition.build().map(|_| ()),
            Err(MapError::DuplicateLayer { layer: 0 })
        );
    }
}
