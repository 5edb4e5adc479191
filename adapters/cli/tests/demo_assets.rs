use std::{fs, path::PathBuf, time::Duration};

use strata_core::{Command, Direction, Event, GridPos, Settings};
use strata_rendering::{dispatch, EffectLog, SceneVisibility};
use strata_system_simulation::{apply, query, Simulation};
use strata_world::MapDefinition;

fn demo(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../demos")
        .join(name);
    fs::read_to_string(&path).unwrap_or_else(|error| panic!("read {}: {error}", path.display()))
}

#[test]
fn demo_settings_override_defaults() {
    let settings: Settings = toml::from_str(&demo("settings.toml")).expect("settings parse");
    assert_eq!(settings.occlusion_alpha, 0.4);
    assert_eq!(settings.rng_seed, 7);
    assert_eq!(settings.max_jump_tiles, Settings::default().max_jump_tiles);
}

#[test]
fn walking_to_the_shore_passes_under_the_bridge() {
    let definition: MapDefinition = toml::from_str(&demo("harbor.toml")).expect("map parses");
    let map = definition.build().expect("map builds");
    let map_id = map.id();
    let mut simulation = Simulation::new(Settings::default());
    simulation.register_map(map).expect("map registers");
    let hero = simulation.spawn_at_map_spawn(map_id).expect("spawn point");

    let mut events = Vec::new();
    let mut scene = SceneVisibility::new();
    let mut effects = EffectLog::new();
    let dt = Duration::from_millis(50);
    let mut saw_faded_bridge = false;

    for _ in 0..4 {
        apply(
            &mut simulation,
            Command::Move {
                actor: hero,
                direction: Direction::Up,
            },
            &mut events,
        );
        for _ in 0..10 {
            apply(&mut simulation, Command::Tick { dt }, &mut events);
        }
        dispatch(&events, &mut scene, &mut effects).expect("presentation accepts events");
        saw_faded_bridge |= scene.faded_tiles() > 0;
        events.clear();
    }

    let actor = query::actor(&simulation, hero).expect("hero exists");
    assert_eq!(actor.cell(), GridPos::new(3, 4), "the walk ends on the shore");
    assert!(saw_faded_bridge, "the bridge faded while the hero was under it");
    assert_eq!(scene.faded_tiles(), 0, "the bridge is opaque again");
    assert_eq!(effects.active_splashes(), 1);

    apply(
        &mut simulation,
        Command::Move {
            actor: hero,
            direction: Direction::Up,
        },
        &mut events,
    );
    assert!(
        events
            .iter()
            .any(|event| matches!(event, Event::MoveRejected { .. })),
        "swimming is disabled by default",
    );
}
