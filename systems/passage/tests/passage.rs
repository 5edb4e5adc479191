use strata_core::{
    Direction, GridPos, LayerIndex, MapId, Passage, Settings, StepOutcome, SubGridId, TerrainTag,
    TerrainTile, TileFlags,
};
use strata_system_passage::{
    can_step, derive_on_stairs, extend_stair_route, interaction_cell, validate_landing, JumpKind,
    StepFlags,
};
use strata_world::{
    LayeredMap, MapBuilder, NeighborResolver, NeighborSnapshot, ResolveOptions, TileCache,
};

const GROUND: LayerIndex = LayerIndex::new(0);
const LOWER: LayerIndex = LayerIndex::new(-1);

fn snapshot_at(
    map: &LayeredMap,
    cell: GridPos,
    layer: LayerIndex,
    direction: Direction,
) -> NeighborSnapshot {
    let mut cache = TileCache::new();
    NeighborResolver::new(map, &mut cache).snapshot(cell, layer, direction)
}

fn step(
    map: &LayeredMap,
    cell: GridPos,
    layer: LayerIndex,
    direction: Direction,
    settings: &Settings,
    flags: StepFlags,
) -> StepOutcome {
    let snapshot = snapshot_at(map, cell, layer, direction);
    can_step(direction, &snapshot, flags, settings, |_, _| false)
}

fn field() -> (MapBuilder, strata_core::TileId) {
    let mut builder = MapBuilder::new(MapId::new(1), "field");
    let ground = builder.tile("ground", TerrainTile::new(TerrainTag::Ground));
    builder.fill_ground(GROUND, GridPos::new(-3, -3), GridPos::new(6, 6), ground);
    (builder, ground)
}

#[test]
fn open_ground_allows_steps_both_ways() {
    let (builder, _) = field();
    let map = builder.build();
    let settings = Settings::default();
    let a = GridPos::new(1, 1);
    let b = GridPos::new(1, 2);

    assert_eq!(
        step(&map, a, GROUND, Direction::Up, &settings, StepFlags::default()),
        StepOutcome::Allowed,
        "plain ground should allow stepping up",
    );
    assert_eq!(
        step(&map, b, GROUND, Direction::Down, &settings, StepFlags::default()),
        StepOutcome::Allowed,
        "the reverse step should be symmetric",
    );
}

#[test]
fn missing_tiles_are_walls() {
    let (builder, _) = field();
    let map = builder.build();
    assert_eq!(
        step(
            &map,
            GridPos::new(6, 0),
            GROUND,
            Direction::Right,
            &Settings::default(),
            StepFlags::default(),
        ),
        StepOutcome::BlockedByWall,
        "the edge of the map is impassable",
    );
}

#[test]
fn passage_flags_gate_exit_and_entry() {
    let (mut builder, _) = field();
    let one_way = builder.tile(
        "one_way",
        TerrainTile::new(TerrainTag::Ground).with_passage(Passage::UP | Passage::DOWN),
    );
    builder.place_ground(GROUND, GridPos::new(2, 2), one_way);
    let map = builder.build();
    let settings = Settings::default();

    assert_eq!(
        step(&map, GridPos::new(1, 2), GROUND, Direction::Right, &settings, StepFlags::default()),
        StepOutcome::BlockedByWall,
        "entering from the left requires the left edge to be open",
    );
    assert_eq!(
        step(&map, GridPos::new(2, 2), GROUND, Direction::Left, &settings, StepFlags::default()),
        StepOutcome::BlockedByWall,
        "leaving through a closed edge is refused",
    );
    assert_eq!(
        step(&map, GridPos::new(2, 1), GROUND, Direction::Up, &settings, StepFlags::default()),
        StepOutcome::Allowed,
    );
}

#[test]
fn occupied_destination_blocks_by_event() {
    let (builder, _) = field();
    let map = builder.build();
    let snapshot = snapshot_at(&map, GridPos::new(0, 0), GROUND, Direction::Right);
    let outcome = can_step(
        Direction::Right,
        &snapshot,
        StepFlags::default(),
        &Settings::default(),
        |cell, layer| cell == GridPos::new(1, 0) && layer == GROUND,
    );
    assert_eq!(outcome, StepOutcome::BlockedByEvent);
}

#[test]
fn through_walls_overrides_everything() {
    let (builder, _) = field();
    let map = builder.build();
    let flags = StepFlags {
        through_walls: true,
        ..StepFlags::default()
    };
    assert_eq!(
        step(&map, GridPos::new(6, 0), GROUND, Direction::Right, &Settings::default(), flags),
        StepOutcome::Allowed,
    );
}

#[test]
fn ledges_jump_two_tiles_in_their_direction_only() {
    let (mut builder, _) = field();
    let ledge = builder.tile(
        "ledge",
        TerrainTile::new(TerrainTag::Ledge).with_passage(Passage::DOWN),
    );
    builder.place_ground(GROUND, GridPos::new(0, 2), ledge);
    let map = builder.build();
    let mut settings = Settings::default();

    assert_eq!(
        step(&map, GridPos::new(0, 3), GROUND, Direction::Down, &settings, StepFlags::default()),
        StepOutcome::RequiresLedgeJump { tiles: 2 },
    );
    assert_eq!(
        step(&map, GridPos::new(0, 1), GROUND, Direction::Up, &settings, StepFlags::default()),
        StepOutcome::BlockedByWall,
        "ledges cannot be climbed by default",
    );

    settings.allow_jump_up_ledges = true;
    assert_eq!(
        step(&map, GridPos::new(0, 1), GROUND, Direction::Up, &settings, StepFlags::default()),
        StepOutcome::RequiresLedgeJump { tiles: 2 },
    );
}

#[test]
fn jump_tiles_hop_a_single_tile() {
    let (mut builder, _) = field();
    let spring = builder.tile("spring", TerrainTile::new(TerrainTag::JumpTile));
    builder.place_ground(GROUND, GridPos::new(3, 0), spring);
    let map = builder.build();
    let settings = Settings::default();

    assert_eq!(
        step(&map, GridPos::new(2, 0), GROUND, Direction::Right, &settings, StepFlags::default()),
        StepOutcome::RequiresLedgeJump { tiles: 1 },
    );
    assert_eq!(
        step(&map, GridPos::new(3, 0), GROUND, Direction::Up, &settings, StepFlags::default()),
        StepOutcome::RequiresLedgeJump { tiles: 1 },
    );
}

fn lake() -> LayeredMap {
    let mut builder = MapBuilder::new(MapId::new(2), "lake");
    let shore = builder.tile("shore", TerrainTile::new(TerrainTag::Shore));
    let water = builder.tile("water", TerrainTile::new(TerrainTag::Water));
    builder.fill_ground(GROUND, GridPos::new(0, 0), GridPos::new(4, 2), shore);
    builder.fill_ground(GROUND, GridPos::new(0, 3), GridPos::new(4, 5), water);
    builder.place_ground(GROUND, GridPos::new(4, 3), shore);
    builder.build()
}

#[test]
fn water_is_closed_without_swimming() {
    let map = lake();
    assert_eq!(
        step(
            &map,
            GridPos::new(2, 2),
            GROUND,
            Direction::Up,
            &Settings::default(),
            StepFlags {
                swim_allowed: true,
                ..StepFlags::default()
            },
        ),
        StepOutcome::BlockedByWall,
        "swimming is disabled globally",
    );
}

#[test]
fn swimming_requires_matching_flanks() {
    let map = lake();
    let settings = Settings {
        allow_swimming: true,
        ..Settings::default()
    };
    let flags = StepFlags {
        swim_allowed: true,
        ..StepFlags::default()
    };

    assert_eq!(
        step(&map, GridPos::new(2, 2), GROUND, Direction::Up, &settings, flags),
        StepOutcome::RequiresSwimEntry {
            tiles: 2,
            entering: true,
        },
    );
    assert_eq!(
        step(&map, GridPos::new(3, 2), GROUND, Direction::Up, &settings, flags),
        StepOutcome::BlockedByWall,
        "a dry flank means the step would cut a corner",
    );
    assert_eq!(
        step(&map, GridPos::new(2, 3), GROUND, Direction::Down, &settings, flags),
        StepOutcome::RequiresSwimEntry {
            tiles: 2,
            entering: false,
        },
    );
    assert_eq!(
        step(&map, GridPos::new(2, 2), GROUND, Direction::Up, &settings, StepFlags::default()),
        StepOutcome::BlockedByWall,
        "the actor itself must be allowed to swim",
    );
}

#[test]
fn divers_stay_on_the_sea_floor() {
    let mut builder = MapBuilder::new(MapId::new(3), "reef");
    let floor = builder.tile("floor", TerrainTile::new(TerrainTag::Underwater));
    let sand = builder.tile("sand", TerrainTile::new(TerrainTag::Sand));
    builder.fill_ground(GROUND, GridPos::new(0, 0), GridPos::new(2, 0), floor);
    builder.place_ground(GROUND, GridPos::new(3, 0), sand);
    let map = builder.build();
    let settings = Settings::default();
    let diving = StepFlags {
        underwater: true,
        ..StepFlags::default()
    };

    assert_eq!(
        step(&map, GridPos::new(1, 0), GROUND, Direction::Right, &settings, diving),
        StepOutcome::Allowed,
    );
    assert_eq!(
        step(&map, GridPos::new(2, 0), GROUND, Direction::Right, &settings, diving),
        StepOutcome::BlockedByWall,
        "divers cannot leave the sea floor",
    );
    assert_eq!(
        step(&map, GridPos::new(3, 0), GROUND, Direction::Left, &settings, StepFlags::default()),
        StepOutcome::BlockedByWall,
        "surface walkers cannot enter the sea floor",
    );
}

fn staircase() -> LayeredMap {
    let mut builder = MapBuilder::new(MapId::new(4), "stairs");
    let ground = builder.tile("ground", TerrainTile::new(TerrainTag::Ground));
    let stairs = builder.tile("stairs", TerrainTile::new(TerrainTag::StairsDown));
    builder.fill_ground(GROUND, GridPos::new(0, 0), GridPos::new(0, 3), ground);
    builder.place_ground(GROUND, GridPos::new(0, 0), stairs);
    builder.fill_ground(LOWER, GridPos::new(0, -3), GridPos::new(0, -1), ground);
    builder.build()
}

#[test]
fn stepping_off_stairs_descends_a_layer() {
    let map = staircase();
    let flags = StepFlags {
        on_stairs: true,
        ..StepFlags::default()
    };
    assert_eq!(
        step(&map, GridPos::new(0, 0), GROUND, Direction::Down, &Settings::default(), flags),
        StepOutcome::RequiresStairTransition {
            destination: GridPos::new(0, -1),
            layer_delta: -1,
        },
    );
    assert_eq!(
        step(&map, GridPos::new(0, 0), GROUND, Direction::Left, &Settings::default(), flags),
        StepOutcome::BlockedByWall,
        "stairs cannot be left sideways",
    );
}

#[test]
fn climbing_stairs_extends_onto_the_landing() {
    let map = staircase();
    let settings = Settings::default();
    let snapshot = snapshot_at(&map, GridPos::new(0, -1), LOWER, Direction::Up);
    let outcome = can_step(
        Direction::Up,
        &snapshot,
        StepFlags::default(),
        &settings,
        |_, _| false,
    );
    assert_eq!(
        outcome,
        StepOutcome::RequiresStairTransition {
            destination: GridPos::new(0, 0),
            layer_delta: 1,
        },
    );
    assert_eq!(
        extend_stair_route(&snapshot, outcome, |_, _| false),
        StepOutcome::RequiresStairTransition {
            destination: GridPos::new(0, 1),
            layer_delta: 1,
        },
    );
    assert_eq!(
        extend_stair_route(&snapshot, outcome, |cell, _| cell == GridPos::new(0, 1)),
        outcome,
        "an occupied landing keeps the single-cell transition",
    );
}

#[test]
fn walking_onto_stair_top_extends_to_the_foot() {
    let map = staircase();
    let snapshot = snapshot_at(&map, GridPos::new(0, 1), GROUND, Direction::Down);
    let outcome = can_step(
        Direction::Down,
        &snapshot,
        StepFlags::default(),
        &Settings::default(),
        |_, _| false,
    );
    assert_eq!(outcome, StepOutcome::Allowed);
    assert_eq!(
        extend_stair_route(&snapshot, outcome, |_, _| false),
        StepOutcome::RequiresStairTransition {
            destination: GridPos::new(0, -1),
            layer_delta: -1,
        },
    );
}

#[test]
fn on_stairs_follows_the_cell_and_the_facing_tile() {
    let map = staircase();
    assert!(derive_on_stairs(&snapshot_at(
        &map,
        GridPos::new(0, 0),
        GROUND,
        Direction::Down
    )));
    assert!(derive_on_stairs(&snapshot_at(
        &map,
        GridPos::new(0, -1),
        LOWER,
        Direction::Up
    )));
    assert!(!derive_on_stairs(&snapshot_at(
        &map,
        GridPos::new(0, -1),
        LOWER,
        Direction::Down
    )));
}

#[test]
fn hideable_upper_terrain_blocks_when_walk_behind_is_disabled() {
    let (mut builder, _) = field();
    let cliff = builder.tile(
        "cliff",
        TerrainTile::new(TerrainTag::Cliff).with_flags(TileFlags::HIDEABLE),
    );
    builder.place_ground(LayerIndex::new(1), GridPos::new(0, 1), cliff);
    let map = builder.build();
    let mut settings = Settings::default();

    assert_eq!(
        step(&map, GridPos::new(0, 0), GROUND, Direction::Up, &settings, StepFlags::default()),
        StepOutcome::Allowed,
    );
    settings.allow_walk_behind_terrain_edges = false;
    assert_eq!(
        step(&map, GridPos::new(0, 0), GROUND, Direction::Up, &settings, StepFlags::default()),
        StepOutcome::BlockedByWall,
    );
}

#[test]
fn landings_respect_objects_and_surfaces() {
    let (mut builder, ground) = field();
    let boulder = builder.tile(
        "boulder",
        TerrainTile::new(TerrainTag::None).with_passage(Passage::empty()),
    );
    let water = builder.tile("water", TerrainTile::new(TerrainTag::Water));
    builder.place_object(GROUND, 0, GridPos::new(1, 0), boulder);
    builder.place_ground(GROUND, GridPos::new(0, 3), water);
    let map = builder.build();
    let mut cache = TileCache::new();
    let mut resolver = NeighborResolver::new(&map, &mut cache);
    let mut settings = Settings::default();

    let over = [resolver.resolve(GROUND, GridPos::new(1, 0), ResolveOptions::SPECULATIVE)];
    assert_eq!(over[0].map(|tile| tile.sub_grid()), Some(SubGridId::Object(0)));
    let landing = resolver.resolve(GROUND, GridPos::new(2, 0), ResolveOptions::SPECULATIVE);
    assert_eq!(landing.map(|tile| tile.tile_id()), Some(ground));

    assert!(!validate_landing(
        JumpKind::Hop,
        Direction::Right,
        landing.as_ref(),
        &over,
        &settings,
        false,
    ));
    settings.allow_jump_over_objects = true;
    assert!(validate_landing(
        JumpKind::Hop,
        Direction::Right,
        landing.as_ref(),
        &over,
        &settings,
        false,
    ));
    assert!(!validate_landing(
        JumpKind::Hop,
        Direction::Right,
        landing.as_ref(),
        &over,
        &settings,
        true,
    ));

    let pond = resolver.resolve(GROUND, GridPos::new(0, 3), ResolveOptions::SPECULATIVE);
    assert!(validate_landing(JumpKind::SwimEnter, Direction::Up, pond.as_ref(), &[], &settings, false));
    assert!(!validate_landing(JumpKind::Ledge, Direction::Up, pond.as_ref(), &[], &settings, false));
    assert!(resolver.cache().is_empty(), "speculative lookups never fill the cache");
}

#[test]
fn counters_extend_the_interaction_reach() {
    let (mut builder, _) = field();
    let counter = builder.tile(
        "counter",
        TerrainTile::new(TerrainTag::None)
            .with_passage(Passage::empty())
            .with_flags(TileFlags::COUNTER),
    );
    builder.place_object(GROUND, 0, GridPos::new(0, 1), counter);
    let map = builder.build();

    assert_eq!(
        interaction_cell(&snapshot_at(&map, GridPos::new(0, 0), GROUND, Direction::Up)),
        Some(GridPos::new(0, 2)),
    );
    assert_eq!(
        interaction_cell(&snapshot_at(&map, GridPos::new(0, 0), GROUND, Direction::Right)),
        Some(GridPos::new(1, 0)),
    );
}
