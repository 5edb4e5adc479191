#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line driver that walks an actor across a map along a script.

mod script;

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use clap::Parser;
use strata_core::{Command, Event, Settings};
use strata_rendering::{dispatch, EffectLog, SceneVisibility};
use strata_system_simulation::{apply, query, Simulation};
use strata_world::MapDefinition;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Walks an actor across a layered map and reports what happened.
#[derive(Debug, Parser)]
#[command(name = "strata", version, about, long_about = None)]
struct Args {
    /// TOML map definition to load.
    #[arg(long)]
    map: PathBuf,

    /// TOML settings file; defaults apply when omitted.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Walking script: `U D L R` move, `u d l r` turn, `J` jump, `?` random turn.
    #[arg(long, default_value = "")]
    script: String,

    /// Simulated milliseconds per tick.
    #[arg(long, default_value_t = 50)]
    tick_ms: u64,

    /// Ticks granted to each scripted request before moving on.
    #[arg(long, default_value_t = 40)]
    max_ticks_per_step: u32,
}

/// Entry point for the Strata command-line interface.
fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    run(&args)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn run(args: &Args) -> Result<()> {
    let settings = load_settings(args.settings.as_deref())?;
    let definition = load_map(&args.map)?;
    let map = definition
        .build()
        .with_context(|| format!("failed to build map {}", args.map.display()))?;
    let map_id = map.id();
    let steps = script::parse(&args.script).context("failed to parse walking script")?;

    let mut simulation = Simulation::new(settings);
    simulation.register_map(map)?;
    let hero = simulation
        .spawn_at_map_spawn(map_id)
        .context("map cannot host the walker")?;

    let dt = Duration::from_millis(args.tick_ms);
    let mut scene = SceneVisibility::new();
    let mut effects = EffectLog::new();
    let mut events = Vec::new();

    apply(&mut simulation, Command::Tick { dt }, &mut events);
    flush(&mut events, &mut scene, &mut effects)?;

    for step in steps {
        apply(&mut simulation, step.command(hero), &mut events);
        let mut ticks = 0;
        loop {
            apply(&mut simulation, Command::Tick { dt }, &mut events);
            ticks += 1;
            let busy = query::actor(&simulation, hero).is_some_and(|actor| actor.is_busy());
            if !busy {
                break;
            }
            if ticks >= args.max_ticks_per_step {
                warn!(?step, ticks, "step_did_not_settle");
                break;
            }
        }
        flush(&mut events, &mut scene, &mut effects)?;
    }

    if let Some(actor) = query::actor(&simulation, hero) {
        info!(
            cell = ?actor.cell(),
            layer = actor.layer().get(),
            facing = ?actor.facing(),
            sorting_order = actor.sorting_order(),
            under_bridge = actor.flags().under_bridge,
            "walk_finished"
        );
    }
    if let Some(stats) = query::cache_stats(&simulation, map_id) {
        info!(
            hits = stats.hits,
            misses = stats.misses,
            entries = stats.entries,
            "tile_cache"
        );
    }
    info!(
        faded_tiles = scene.faded_tiles(),
        effects = effects.requests().len(),
        active_splashes = effects.active_splashes(),
        ticks = query::tick_index(&simulation),
        "presentation"
    );
    Ok(())
}

fn flush(
    events: &mut Vec<Event>,
    scene: &mut SceneVisibility,
    effects: &mut EffectLog,
) -> Result<()> {
    for event in events.iter() {
        match event {
            Event::TimeAdvanced { .. } => {}
            Event::MoveRejected { .. } | Event::StepStarted { .. } | Event::JumpStarted { .. } => {
                info!(?event, "actor_request");
            }
            _ => debug!(?event, "event"),
        }
    }
    dispatch(events, scene, effects).context("presentation rejected an event")?;
    events.clear();
    Ok(())
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let Some(path) = path else {
        return Ok(Settings::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("failed to parse settings {}", path.display()))
}

fn load_map(path: &Path) -> Result<MapDefinition> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read map {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("failed to parse map {}", path.display()))
}
