#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative simulation context for the Strata engine.
//!
//! [`Simulation`] owns the map registry, one occlusion tracker and effect
//! executor per map, every actor, and the seeded random source used for
//! random turns. Adapters mutate it exclusively through [`apply`] and read it
//! through the [`query`] module.

use std::{collections::BTreeMap, time::Duration};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use strata_core::{ActorId, Command, Direction, Event, GridPos, LayerIndex, MapId, Settings};
use strata_system_effects::Effects;
use strata_system_motion::{ActorMotion, MotionEnv, TickReport};
use strata_system_occlusion::Occlusion;
use strata_world::{LayeredMap, MapError, MapRegistry};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors raised while setting up the simulation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SimulationError {
    /// The map was never registered.
    #[error("map {map} is not registered")]
    UnknownMap {
        /// Identifier that was requested.
        map: u32,
    },
    /// The actor does not exist.
    #[error("actor {actor} does not exist")]
    UnknownActor {
        /// Identifier that was requested.
        actor: u32,
    },
    /// The map declares no spawn point.
    #[error("map {map} declares no spawn point")]
    MissingSpawn {
        /// Identifier of the map.
        map: u32,
    },
    /// The map could not be registered.
    #[error(transparent)]
    Map(#[from] MapError),
}

#[derive(Debug)]
struct MapRuntime {
    occlusion: Occlusion,
    effects: Effects,
}

#[derive(Debug)]
struct ActorSlot {
    map: MapId,
    motion: ActorMotion,
}

/// Owns every piece of mutable engine state.
#[derive(Debug)]
pub struct Simulation {
    settings: Settings,
    registry: MapRegistry,
    runtimes: BTreeMap<MapId, MapRuntime>,
    actors: BTreeMap<ActorId, ActorSlot>,
    camera_target: Option<ActorId>,
    rng: ChaCha8Rng,
    next_actor: u32,
    tick_index: u64,
}

impl Simulation {
    /// Creates an empty simulation seeded from `settings.rng_seed`.
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(settings.rng_seed);
        Self {
            settings,
            registry: MapRegistry::new(),
            runtimes: BTreeMap::new(),
            actors: BTreeMap::new(),
            camera_target: None,
            rng,
            next_actor: 0,
            tick_index: 0,
        }
    }

    /// Registers a map together with a fresh runtime.
    pub fn register_map(&mut self, map: LayeredMap) -> Result<(), SimulationError> {
        let id = map.id();
        self.registry.insert(map)?;
        let _ = self.runtimes.insert(
            id,
            MapRuntime {
                occlusion: Occlusion::new(),
                effects: Effects::new(self.settings.effects),
            },
        );
        Ok(())
    }

    /// Creates an actor on a map. The first actor becomes the camera target.
    pub fn spawn_actor(
        &mut self,
        map: MapId,
        cell: GridPos,
        layer: LayerIndex,
        facing: Direction,
    ) -> Result<ActorId, SimulationError> {
        if self.registry.map(map).is_none() {
            return Err(SimulationError::UnknownMap { map: map.get() });
        }
        let id = ActorId::new(self.next_actor);
        self.next_actor += 1;
        let _ = self.actors.insert(
            id,
            ActorSlot {
                map,
                motion: ActorMotion::new(id, cell, layer, facing),
            },
        );
        if self.camera_target.is_none() {
            self.camera_target = Some(id);
        }
        info!(actor = id.get(), map = map.get(), ?cell, layer = layer.get(), "actor_spawned");
        Ok(id)
    }

    /// Creates an actor on the spawn point the map declares.
    pub fn spawn_at_map_spawn(&mut self, map: MapId) -> Result<ActorId, SimulationError> {
        let spawn = self
            .registry
            .map(map)
            .ok_or(SimulationError::UnknownMap { map: map.get() })?
            .spawn()
            .ok_or(SimulationError::MissingSpawn { map: map.get() })?;
        self.spawn_actor(map, spawn.cell, spawn.layer, spawn.facing)
    }

    /// Chooses the actor whose view drives occlusion.
    pub fn set_camera_target(&mut self, actor: ActorId) -> Result<(), SimulationError> {
        if !self.actors.contains_key(&actor) {
            return Err(SimulationError::UnknownActor { actor: actor.get() });
        }
        self.camera_target = Some(actor);
        Ok(())
    }

    /// Allows or forbids an actor to enter and leave water.
    pub fn set_swim_allowed(&mut self, actor: ActorId, allowed: bool) -> Result<(), SimulationError> {
        self.motion_mut(actor)?.set_swim_allowed(allowed);
        Ok(())
    }

    /// Lets an actor ignore every passage rule.
    pub fn set_through_walls(&mut self, actor: ActorId, enabled: bool) -> Result<(), SimulationError> {
        self.motion_mut(actor)?.set_through_walls(enabled);
        Ok(())
    }

    fn motion_mut(&mut self, actor: ActorId) -> Result<&mut ActorMotion, SimulationError> {
        self.actors
            .get_mut(&actor)
            .map(|slot| &mut slot.motion)
            .ok_or(SimulationError::UnknownActor { actor: actor.get() })
    }

    /// Runs `f` against an actor with the collaborators of its map.
    ///
    /// Cells held by every other actor on the same map count as occupied.
    fn drive<R, F>(&mut self, actor: ActorId, out: &mut Vec<Event>, f: F) -> Option<R>
    where
        F: FnOnce(&mut ActorMotion, &mut MotionEnv<'_, '_, LayeredMap>, &mut ChaCha8Rng) -> R,
    {
        let Some(map) = self.actors.get(&actor).map(|slot| slot.map) else {
            warn!(actor = actor.get(), "unknown_actor");
            return None;
        };
        let held: Vec<(GridPos, LayerIndex)> = self
            .actors
            .iter()
            .filter(|(id, slot)| **id != actor && slot.map == map)
            .flat_map(|(_, slot)| slot.motion.occupied_cells())
            .collect();
        let occupied = |cell: GridPos, layer: LayerIndex| held.contains(&(cell, layer));

        let slot = self.actors.get_mut(&actor)?;
        let runtime = self.runtimes.get_mut(&map)?;
        let mut resolver = self.registry.resolver(map)?;
        let mut env = MotionEnv {
            resolver: &mut resolver,
            settings: &self.settings,
            effects: &mut runtime.effects,
            occupied: &occupied,
            out,
        };
        Some(f(&mut slot.motion, &mut env, &mut self.rng))
    }

    fn tick(&mut self, dt: Duration, out: &mut Vec<Event>) {
        self.tick_index = self.tick_index.saturating_add(1);
        out.push(Event::TimeAdvanced { dt });

        for runtime in self.runtimes.values_mut() {
            runtime.effects.tick(dt, out);
        }

        let ids: Vec<ActorId> = self.actors.keys().copied().collect();
        for id in ids {
            let report = self
                .drive(id, out, |motion, env, _| motion.tick(dt, env))
                .unwrap_or_default();
            if report.initial_checks
                && !report.underwater_changed
                && self.camera_target == Some(id)
            {
                self.announce_camera_tilt(id, out);
            }
            log_tick(id, report);
        }

        self.update_camera_occlusion(out);
    }

    fn announce_camera_tilt(&self, actor: ActorId, out: &mut Vec<Event>) {
        if let Some(slot) = self.actors.get(&actor) {
            out.push(Event::UnderwaterChanged {
                actor,
                underwater: slot.motion.flags().underwater,
            });
        }
    }

    fn update_camera_occlusion(&mut self, out: &mut Vec<Event>) {
        let Some(camera) = self.camera_target else {
            return;
        };
        let Some(slot) = self.actors.get_mut(&camera) else {
            return;
        };
        let Some(runtime) = self.runtimes.get_mut(&slot.map) else {
            return;
        };
        let Some(mut resolver) = self.registry.resolver(slot.map) else {
            return;
        };
        let viewer = GridPos::from_vec2_rounded(slot.motion.position());
        let report = runtime.occlusion.update(
            &mut resolver,
            viewer,
            slot.motion.layer(),
            &self.settings,
            out,
        );
        slot.motion.set_occlusion(
            report.under_bridge,
            report.behind_upper_layer,
            report.behind_prefab,
        );
    }
}

fn log_tick(actor: ActorId, report: TickReport) {
    if report.arrived {
        debug!(
            actor = actor.get(),
            layer_changed = report.layer_changed,
            initial_checks = report.initial_checks,
            "actor_tick_arrived"
        );
    }
}

/// Applies a command to the simulation, broadcasting resulting events.
///
/// Commands naming an unknown actor are logged and ignored.
pub fn apply(simulation: &mut Simulation, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::Tick { dt } => simulation.tick(dt, out_events),
        Command::Place {
            actor,
            cell,
            layer,
            facing,
        } => {
            let _ = simulation.drive(actor, out_events, |motion, env, _| {
                motion.place(cell, layer, facing, env);
            });
        }
        Command::Move { actor, direction } => {
            let _ = simulation.drive(actor, out_events, |motion, env, _| {
                motion.step(direction, env)
            });
        }
        Command::Turn { actor, direction } => {
            let _ = simulation.drive(actor, out_events, |motion, env, _| {
                motion.turn(direction, env)
            });
        }
        Command::RandomTurn { actor } => {
            let _ = simulation.drive(actor, out_events, |motion, env, rng| {
                motion.random_turn(rng, env)
            });
        }
        Command::JumpForward { actor, tiles } => {
            let _ = simulation.drive(actor, out_events, |motion, env, _| {
                motion.jump_forward(tiles, env)
            });
        }
        Command::ChangeSpeed { actor, speed } => match simulation.motion_mut(actor) {
            Ok(motion) => motion.change_speed(speed),
            Err(error) => warn!(%error, "command_ignored"),
        },
        Command::SetDirectionLock { actor, locked } => match simulation.motion_mut(actor) {
            Ok(motion) => motion.set_direction_lock(locked),
            Err(error) => warn!(%error, "command_ignored"),
        },
        Command::CancelMovement { actor } => match simulation.motion_mut(actor) {
            Ok(motion) => {
                let _ = motion.cancel_movement();
            }
            Err(error) => warn!(%error, "command_ignored"),
        },
    }
}

/// Query functions that provide read-only access to the simulation.
pub mod query {
    use strata_core::{ActorId, MapId, Settings};
    use strata_system_effects::Effects;
    use strata_system_motion::ActorMotion;
    use strata_system_occlusion::Occlusion;
    use strata_world::{CacheStats, LayeredMap};

    use super::Simulation;

    /// Settings the simulation runs with.
    #[must_use]
    pub fn settings(simulation: &Simulation) -> &Settings {
        &simulation.settings
    }

    /// Motion state of an actor.
    #[must_use]
    pub fn actor(simulation: &Simulation, id: ActorId) -> Option<&ActorMotion> {
        simulation.actors.get(&id).map(|slot| &slot.motion)
    }

    /// Map an actor walks on.
    #[must_use]
    pub fn actor_map(simulation: &Simulation, id: ActorId) -> Option<MapId> {
        simulation.actors.get(&id).map(|slot| slot.map)
    }

    /// Every actor in ascending identifier order.
    pub fn actors(simulation: &Simulation) -> impl Iterator<Item = &ActorMotion> + '_ {
        simulation.actors.values().map(|slot| &slot.motion)
    }

    /// Actor whose view drives occlusion.
    #[must_use]
    pub fn camera_target(simulation: &Simulation) -> Option<ActorId> {
        simulation.camera_target
    }

    /// Registered map.
    #[must_use]
    pub fn map(simulation: &Simulation, id: MapId) -> Option<&LayeredMap> {
        simulation.registry.map(id)
    }

    /// Tile cache statistics of a map.
    #[must_use]
    pub fn cache_stats(simulation: &Simulation, id: MapId) -> Option<CacheStats> {
        simulation.registry.cache_stats(id)
    }

    /// Occlusion tracker of a map.
    #[must_use]
    pub fn occlusion(simulation: &Simulation, id: MapId) -> Option<&Occlusion> {
        simulation.runtimes.get(&id).map(|runtime| &runtime.occlusion)
    }

    /// Effect executor of a map.
    #[must_use]
    pub fn effects(simulation: &Simulation, id: MapId) -> Option<&Effects> {
        simulation.runtimes.get(&id).map(|runtime| &runtime.effects)
    }

    /// Number of ticks processed so far.
    #[must_use]
    pub fn tick_index(simulation: &Simulation) -> u64 {
        simulation.tick_index
    }
}
