#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Per-actor motion controller.
//!
//! [`ActorMotion`] owns everything about a single actor's position on the
//! layered grid: the interpolated position and its target, the facing and its
//! smoothed angle, the jump arc, and the flags derived from the tile under the
//! actor. Requests consult the passage rules first and either start a move or
//! leave the actor untouched. [`ActorMotion::tick`] advances interpolation and
//! applies deferred layer changes once the actor arrives.

use std::time::Duration;

use glam::Vec2;
use rand::{seq::SliceRandom, Rng};
use strata_core::{
    sorting_order, ActorId, Direction, Event, GridPos, LayerIndex, Settings, SpeedClass,
    StepOutcome, TerrainTag,
};
use strata_system_effects::Effects;
use strata_system_passage::{
    can_step, derive_on_stairs, extend_stair_route, interaction_cell, validate_landing, JumpKind,
    StepFlags,
};
use strata_world::{
    MatchedTile, NeighborResolver, NeighborSnapshot, ResolveOptions, TerrainSource,
};
use tracing::{debug, info, trace};

/// Collaborators a motion request reads from and writes to.
pub struct MotionEnv<'e, 'm, S: ?Sized> {
    /// Resolver bound to the map the actor walks on.
    pub resolver: &'e mut NeighborResolver<'m, S>,
    /// Read-only engine configuration.
    pub settings: &'e Settings,
    /// Effect executor of the map.
    pub effects: &'e mut Effects,
    /// Reports whether another actor holds a cell on a layer.
    pub occupied: &'e dyn Fn(GridPos, LayerIndex) -> bool,
    /// Event sink.
    pub out: &'e mut Vec<Event>,
}

/// Boolean state derived from movement and the tile under the actor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MotionFlags {
    /// The position differs from the target.
    pub moving: bool,
    /// The smoothed angle has not reached the facing yet.
    pub rotating: bool,
    /// Rising half of a jump.
    pub jumping: bool,
    /// Falling half of a jump.
    pub falling: bool,
    /// The actor stands on or is about to step onto stairs.
    pub on_stairs: bool,
    /// The tile under the actor is water.
    pub on_water: bool,
    /// The actor is diving.
    pub underwater: bool,
    /// A reflective tile sits below the actor.
    pub show_reflection: bool,
    /// The actor stands in a bush or tall grass.
    pub in_bush: bool,
    /// A bridge above the actor is faded.
    pub under_bridge: bool,
    /// Upper-layer terrain in front of the actor is faded.
    pub behind_upper_layer: bool,
    /// A prefab covering the actor is faded.
    pub behind_prefab: bool,
    /// The arrival tile has been activated.
    pub tile_activated: bool,
}

/// Geometry of a jump in flight.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JumpArc {
    height: f32,
    direction: Vec2,
    tiles: u8,
    source_reflective: bool,
    origin: Vec2,
    apex: Vec2,
    landing: Vec2,
}

impl JumpArc {
    /// Peak height of the arc.
    #[must_use]
    pub const fn height(&self) -> f32 {
        self.height
    }

    /// Unit vector of travel.
    #[must_use]
    pub const fn direction(&self) -> Vec2 {
        self.direction
    }

    /// Distance of the jump in cells.
    #[must_use]
    pub const fn tiles(&self) -> u8 {
        self.tiles
    }

    /// Whether the take-off tile reflects the actor.
    #[must_use]
    pub const fn source_reflective(&self) -> bool {
        self.source_reflective
    }

    /// Take-off position.
    #[must_use]
    pub const fn origin(&self) -> Vec2 {
        self.origin
    }

    /// Ground position under the peak of the arc.
    #[must_use]
    pub const fn apex(&self) -> Vec2 {
        self.apex
    }

    /// Landing position.
    #[must_use]
    pub const fn landing(&self) -> Vec2 {
        self.landing
    }
}

/// What happened during a call to [`ActorMotion::tick`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// The actor reached its target cell.
    pub arrived: bool,
    /// A deferred layer change was applied.
    pub layer_changed: bool,
    /// The one-time checks after placement ran.
    pub initial_checks: bool,
    /// Activation flipped the underwater flag and announced it.
    pub underwater_changed: bool,
}

/// Motion state of a single actor.
#[derive(Clone, Debug, PartialEq)]
pub struct ActorMotion {
    id: ActorId,
    cell: GridPos,
    destination: GridPos,
    layer: LayerIndex,
    pending_layer_delta: i32,
    position: Vec2,
    target: Vec2,
    last_position: Vec2,
    facing: Direction,
    angle: f32,
    target_angle: f32,
    speed: SpeedClass,
    flags: MotionFlags,
    jump: Option<JumpArc>,
    snapshot: Option<NeighborSnapshot>,
    last_splash: Option<(LayerIndex, GridPos)>,
    sorting_order: i32,
    initialized: bool,
    lock_direction: bool,
    swim_allowed: bool,
    through_walls: bool,
}

impl ActorMotion {
    /// Creates an idle actor standing on a cell.
    #[must_use]
    pub fn new(id: ActorId, cell: GridPos, layer: LayerIndex, facing: Direction) -> Self {
        let position = cell.to_vec2();
        Self {
            id,
            cell,
            destination: cell,
            layer,
            pending_layer_delta: 0,
            position,
            target: position,
            last_position: position,
            facing,
            angle: facing.angle_degrees(),
            target_angle: facing.angle_degrees(),
            speed: SpeedClass::default(),
            flags: MotionFlags::default(),
            jump: None,
            snapshot: None,
            last_splash: None,
            sorting_order: sorting_order(layer, false),
            initialized: false,
            lock_direction: false,
            swim_allowed: true,
            through_walls: false,
        }
    }

    /// Teleports the actor, dropping any move in flight.
    ///
    /// The one-time checks run again on the next tick.
    pub fn place<S>(
        &mut self,
        cell: GridPos,
        layer: LayerIndex,
        facing: Direction,
        env: &mut MotionEnv<'_, '_, S>,
    ) where
        S: TerrainSource + ?Sized,
    {
        self.leave_cell(env.effects);
        let position = cell.to_vec2();
        self.cell = cell;
        self.destination = cell;
        self.layer = layer;
        self.pending_layer_delta = 0;
        self.position = position;
        self.target = position;
        self.last_position = position;
        self.jump = None;
        self.snapshot = None;
        self.initialized = false;
        let underwater = self.flags.underwater;
        self.flags = MotionFlags {
            underwater,
            ..MotionFlags::default()
        };
        self.facing = facing;
        self.angle = facing.angle_degrees();
        self.target_angle = self.angle;
        env.out.push(Event::FacingChanged {
            actor: self.id,
            direction: facing,
        });
        self.refresh_sorting(env.out);
        info!(actor = self.id.get(), ?cell, layer = layer.get(), "actor_placed");
    }

    /// Requests a step upwards.
    pub fn move_up<S: TerrainSource + ?Sized>(&mut self, env: &mut MotionEnv<'_, '_, S>) -> bool {
        self.step(Direction::Up, env)
    }

    /// Requests a step downwards.
    pub fn move_down<S: TerrainSource + ?Sized>(&mut self, env: &mut MotionEnv<'_, '_, S>) -> bool {
        self.step(Direction::Down, env)
    }

    /// Requests a step to the left.
    pub fn move_left<S: TerrainSource + ?Sized>(&mut self, env: &mut MotionEnv<'_, '_, S>) -> bool {
        self.step(Direction::Left, env)
    }

    /// Requests a step to the right.
    pub fn move_right<S: TerrainSource + ?Sized>(&mut self, env: &mut MotionEnv<'_, '_, S>) -> bool {
        self.step(Direction::Right, env)
    }

    /// Requests a step in `direction`.
    ///
    /// The passage verdict decides whether the step becomes a plain move, a
    /// stair transition, or a jump. A rejected request emits
    /// [`Event::MoveRejected`] and leaves the actor unchanged.
    pub fn step<S>(&mut self, direction: Direction, env: &mut MotionEnv<'_, '_, S>) -> bool
    where
        S: TerrainSource + ?Sized,
    {
        if self.is_busy() {
            trace!(actor = self.id.get(), ?direction, "move_ignored_while_busy");
            return false;
        }

        let snapshot = env.resolver.snapshot(self.cell, self.layer, direction);
        let occupied = env.occupied;
        let verdict = can_step(direction, &snapshot, self.step_flags(), env.settings, occupied);
        let outcome = extend_stair_route(&snapshot, verdict, occupied);

        let started = match outcome {
            StepOutcome::Allowed => {
                let destination = self.cell.neighbor(direction);
                self.begin_step(direction, snapshot, destination, 0, env);
                true
            }
            StepOutcome::RequiresStairTransition {
                destination,
                layer_delta,
            } => {
                self.begin_step(direction, snapshot, destination, layer_delta, env);
                true
            }
            StepOutcome::RequiresLedgeJump { tiles }
            | StepOutcome::RequiresSwimEntry { tiles, .. } => {
                match JumpKind::for_outcome(outcome, &snapshot) {
                    Some(kind) => self.try_jump(direction, tiles, kind, snapshot, env),
                    None => false,
                }
            }
            StepOutcome::BlockedByWall | StepOutcome::BlockedByEvent => false,
        };

        if !started {
            debug!(actor = self.id.get(), ?direction, ?outcome, "move_rejected");
            env.out.push(Event::MoveRejected {
                actor: self.id,
                direction,
                outcome,
            });
        }
        started
    }

    /// Requests a forward hop of up to `tiles` cells.
    ///
    /// Distances beyond the configured maximum, or landings that fail
    /// validation, fall back to shorter hops. A request for zero cells, or one
    /// made while swimming or already moving, fails.
    pub fn jump_forward<S>(&mut self, tiles: u8, env: &mut MotionEnv<'_, '_, S>) -> bool
    where
        S: TerrainSource + ?Sized,
    {
        if tiles == 0 || self.is_busy() || self.flags.on_water || self.flags.underwater {
            return false;
        }
        let direction = self.facing;
        let snapshot = env.resolver.snapshot(self.cell, self.layer, direction);
        let leaves = snapshot
            .on_tile()
            .is_some_and(|tile| tile.allows_exit(direction));
        if !leaves && !self.through_walls {
            return false;
        }
        self.try_jump(direction, tiles, JumpKind::Hop, snapshot, env)
    }

    /// Advances interpolation and rotation by `dt`.
    ///
    /// Arrival applies any deferred layer change, refreshes the stored
    /// snapshot and activates the tile under the actor.
    pub fn tick<S>(&mut self, dt: Duration, env: &mut MotionEnv<'_, '_, S>) -> TickReport
    where
        S: TerrainSource + ?Sized,
    {
        let underwater = self.flags.underwater;
        let mut report = self.advance(dt, env);
        report.underwater_changed = self.flags.underwater != underwater;
        report
    }

    fn advance<S>(&mut self, dt: Duration, env: &mut MotionEnv<'_, '_, S>) -> TickReport
    where
        S: TerrainSource + ?Sized,
    {
        let mut report = TickReport::default();
        self.rotate(dt, env.settings);

        if !self.flags.moving {
            if !self.initialized {
                self.initialized = true;
                report.initial_checks = true;
                self.settle(env);
            } else if !self.flags.tile_activated {
                let _ = self.activate_tile(env);
            }
            return report;
        }

        let speed = match &self.jump {
            Some(arc) => env.settings.jump_speed(arc.tiles),
            None => env.settings.units_per_second(self.speed),
        };
        let travel = speed * dt.as_secs_f32();
        let remaining = self.target - self.position;
        if remaining.length() > travel {
            self.position += remaining.normalize_or_zero() * travel;
            return report;
        }
        self.position = self.target;

        if self.flags.jumping {
            if let Some(arc) = self.jump {
                self.flags.jumping = false;
                self.flags.falling = true;
                self.target = arc.landing;
                trace!(actor = self.id.get(), "jump_apex_reached");
                return report;
            }
        }

        self.flags.moving = false;
        self.flags.falling = false;
        self.jump = None;
        self.cell = self.destination;
        self.last_position = self.position;

        if self.pending_layer_delta != 0 {
            self.layer = self.layer.offset(self.pending_layer_delta);
            self.pending_layer_delta = 0;
            report.layer_changed = true;
            debug!(actor = self.id.get(), layer = self.layer.get(), "layer_changed");
            env.out.push(Event::LayerChanged {
                actor: self.id,
                layer: self.layer,
            });
        }

        env.out.push(Event::ActorArrived {
            actor: self.id,
            cell: self.cell,
            layer: self.layer,
        });
        report.arrived = true;
        if !self.initialized {
            self.initialized = true;
            report.initial_checks = true;
        }
        self.settle(env);
        report
    }

    /// Applies the side effects of the tile under the actor.
    ///
    /// Returns `false` while a jump is in flight so the caller retries later.
    /// Activation happens once per arrival.
    pub fn activate_tile<S>(&mut self, env: &mut MotionEnv<'_, '_, S>) -> bool
    where
        S: TerrainSource + ?Sized,
    {
        if self.flags.jumping || self.flags.falling {
            return false;
        }
        if self.flags.tile_activated {
            return true;
        }
        self.flags.tile_activated = true;

        let matched = env
            .resolver
            .resolve(self.layer, self.cell, ResolveOptions::CACHED);
        let Some(tile) = matched.as_ref().map(MatchedTile::tile).copied() else {
            self.flags.on_water = false;
            self.flags.in_bush = false;
            self.flags.show_reflection = false;
            return true;
        };

        self.flags.on_water = tile.tag.is_water();
        self.flags.in_bush = tile.is_bush() || tile.tag == TerrainTag::TallGrass;
        self.flags.show_reflection = self
            .snapshot
            .and_then(|snapshot| snapshot.down)
            .is_some_and(|below| below.tile().is_reflective());

        let underwater = tile.tag.is_underwater();
        if underwater != self.flags.underwater {
            self.flags.underwater = underwater;
            info!(actor = self.id.get(), underwater, "underwater_changed");
            env.out.push(Event::UnderwaterChanged {
                actor: self.id,
                underwater,
            });
        }

        if tile.tag.is_grass() {
            env.effects.grass_rustle(self.layer, self.cell, env.out);
        }
        if tile.tag.leaves_footprints() {
            let _ = env
                .effects
                .footprint(self.layer, self.cell, self.facing, self.speed);
        }
        if tile.tag.is_shore() {
            let _ = env.effects.start_splash(self.layer, self.cell, env.out);
            self.last_splash = Some((self.layer, self.cell));
        }
        true
    }

    /// Turns in place. Fails while moving or when the facing is locked.
    pub fn turn<S>(&mut self, direction: Direction, env: &mut MotionEnv<'_, '_, S>) -> bool
    where
        S: TerrainSource + ?Sized,
    {
        if self.lock_direction || self.flags.moving {
            return false;
        }
        self.face(direction, env.out);
        let snapshot = env.resolver.snapshot(self.cell, self.layer, direction);
        self.flags.on_stairs = derive_on_stairs(&snapshot);
        self.snapshot = Some(snapshot);
        self.refresh_sorting(env.out);
        true
    }

    /// Turns towards a random direction other than the current facing.
    pub fn random_turn<S, R>(&mut self, rng: &mut R, env: &mut MotionEnv<'_, '_, S>) -> bool
    where
        S: TerrainSource + ?Sized,
        R: Rng + ?Sized,
    {
        if self.lock_direction || self.flags.moving {
            return false;
        }
        let candidates: Vec<Direction> = Direction::ALL
            .into_iter()
            .filter(|direction| *direction != self.facing)
            .collect();
        match candidates.choose(rng) {
            Some(direction) => self.turn(*direction, env),
            None => false,
        }
    }

    /// Changes the speed class used by later steps.
    pub fn change_speed(&mut self, speed: SpeedClass) {
        self.speed = speed;
    }

    /// Locks or unlocks the facing.
    pub fn set_direction_lock(&mut self, locked: bool) {
        self.lock_direction = locked;
    }

    /// Allows or forbids entering and leaving water.
    pub fn set_swim_allowed(&mut self, allowed: bool) {
        self.swim_allowed = allowed;
    }

    /// Lets the actor ignore every passage rule.
    pub fn set_through_walls(&mut self, enabled: bool) {
        self.through_walls = enabled;
    }

    /// Records the occlusion state computed for the actor.
    pub fn set_occlusion(&mut self, under_bridge: bool, behind_upper_layer: bool, behind_prefab: bool) {
        self.flags.under_bridge = under_bridge;
        self.flags.behind_upper_layer = behind_upper_layer;
        self.flags.behind_prefab = behind_prefab;
    }

    /// Sends an in-flight step back to the cell it started from.
    ///
    /// Jumps cannot be cancelled.
    pub fn cancel_movement(&mut self) -> bool {
        if !self.flags.moving || self.jump.is_some() {
            return false;
        }
        self.target = self.last_position;
        self.destination = self.cell;
        self.pending_layer_delta = 0;
        self.flags.moving = self.position != self.target;
        debug!(actor = self.id.get(), cell = ?self.cell, "movement_cancelled");
        true
    }

    /// Identifier of the actor.
    #[must_use]
    pub const fn id(&self) -> ActorId {
        self.id
    }

    /// Cell the actor last settled on.
    #[must_use]
    pub const fn cell(&self) -> GridPos {
        self.cell
    }

    /// Cell the current move ends on; the settled cell while idle.
    #[must_use]
    pub const fn destination(&self) -> GridPos {
        self.destination
    }

    /// Layer the actor occupies. Stair transitions change it on arrival.
    #[must_use]
    pub const fn layer(&self) -> LayerIndex {
        self.layer
    }

    /// Layer the current move ends on.
    #[must_use]
    pub const fn destination_layer(&self) -> LayerIndex {
        self.layer.offset(self.pending_layer_delta)
    }

    /// Layer delta applied on arrival.
    #[must_use]
    pub const fn pending_layer_delta(&self) -> i32 {
        self.pending_layer_delta
    }

    /// Interpolated ground position.
    #[must_use]
    pub const fn position(&self) -> Vec2 {
        self.position
    }

    /// Position the actor is heading to.
    #[must_use]
    pub const fn target(&self) -> Vec2 {
        self.target
    }

    /// Logical facing.
    #[must_use]
    pub const fn facing(&self) -> Direction {
        self.facing
    }

    /// Smoothed facing angle in degrees.
    #[must_use]
    pub const fn angle(&self) -> f32 {
        self.angle
    }

    /// Current speed class.
    #[must_use]
    pub const fn speed(&self) -> SpeedClass {
        self.speed
    }

    /// Derived state flags.
    #[must_use]
    pub const fn flags(&self) -> &MotionFlags {
        &self.flags
    }

    /// Jump in flight, if any.
    #[must_use]
    pub const fn jump(&self) -> Option<JumpArc> {
        self.jump
    }

    /// Neighbourhood captured by the latest request or arrival.
    #[must_use]
    pub const fn snapshot(&self) -> Option<&NeighborSnapshot> {
        self.snapshot.as_ref()
    }

    /// Sprite sorting order.
    #[must_use]
    pub const fn sorting_order(&self) -> i32 {
        self.sorting_order
    }

    /// Whether the facing is locked.
    #[must_use]
    pub const fn is_direction_locked(&self) -> bool {
        self.lock_direction
    }

    /// Reports whether a move or jump is in flight.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.flags.moving || self.flags.jumping || self.flags.falling
    }

    /// Cells the actor holds: the settled one and the destination of its
    /// current move.
    #[must_use]
    pub const fn occupied_cells(&self) -> [(GridPos, LayerIndex); 2] {
        [
            (self.cell, self.layer),
            (self.destination, self.destination_layer()),
        ]
    }

    /// Height above the layer-0 ground plane, including the jump arc.
    #[must_use]
    pub fn elevation(&self, settings: &Settings) -> f32 {
        self.visual_layer() * settings.layer_height_spacing + self.arc_height()
    }

    /// Position used for drawing: the ground position raised by elevation.
    #[must_use]
    pub fn world_position(&self, settings: &Settings) -> Vec2 {
        Vec2::new(self.position.x, self.position.y + self.elevation(settings))
    }

    /// Cell the actor would talk to, reaching over counters.
    #[must_use]
    pub fn interaction_target(&self) -> Option<GridPos> {
        self.snapshot.as_ref().and_then(interaction_cell)
    }

    fn step_flags(&self) -> StepFlags {
        StepFlags {
            underwater: self.flags.underwater,
            on_stairs: self.flags.on_stairs,
            swim_allowed: self.swim_allowed,
            through_walls: self.through_walls,
        }
    }

    fn begin_step<S>(
        &mut self,
        direction: Direction,
        snapshot: NeighborSnapshot,
        destination: GridPos,
        layer_delta: i32,
        env: &mut MotionEnv<'_, '_, S>,
    ) where
        S: TerrainSource + ?Sized,
    {
        self.leave_cell(env.effects);
        self.face(direction, env.out);
        self.last_position = self.position;
        self.destination = destination;
        self.target = destination.to_vec2();
        self.pending_layer_delta = layer_delta;
        self.flags.moving = true;
        self.flags.tile_activated = false;
        self.snapshot = Some(snapshot);
        if layer_delta != 0 {
            self.flags.on_stairs = true;
            self.refresh_sorting(env.out);
        }
        trace!(actor = self.id.get(), from = ?self.cell, to = ?destination, layer_delta, "step_started");
        env.out.push(Event::StepStarted {
            actor: self.id,
            from: self.cell,
            to: destination,
            layer: self.destination_layer(),
        });
    }

    fn try_jump<S>(
        &mut self,
        direction: Direction,
        tiles: u8,
        kind: JumpKind,
        snapshot: NeighborSnapshot,
        env: &mut MotionEnv<'_, '_, S>,
    ) -> bool
    where
        S: TerrainSource + ?Sized,
    {
        let mut tiles = tiles.min(env.settings.max_jump_tiles);
        while tiles > 0 {
            if self.landing_valid(direction, tiles, kind, env) {
                self.start_jump(direction, tiles, snapshot, env);
                return true;
            }
            trace!(actor = self.id.get(), tiles, ?kind, "jump_landing_rejected");
            tiles -= 1;
        }
        false
    }

    fn landing_valid<S>(
        &self,
        direction: Direction,
        tiles: u8,
        kind: JumpKind,
        env: &mut MotionEnv<'_, '_, S>,
    ) -> bool
    where
        S: TerrainSource + ?Sized,
    {
        if self.through_walls {
            return true;
        }
        let speculative = ResolveOptions::SPECULATIVE;
        let landing_cell = self.cell.step(direction, i32::from(tiles));
        let landing = env.resolver.resolve(self.layer, landing_cell, speculative);
        let over: Vec<Option<MatchedTile>> = (1..tiles)
            .map(|distance| {
                let crossed = self.cell.step(direction, i32::from(distance));
                env.resolver.resolve(self.layer, crossed, speculative)
            })
            .collect();
        let occupied = (env.occupied)(landing_cell, self.layer);
        validate_landing(kind, direction, landing.as_ref(), &over, env.settings, occupied)
    }

    fn start_jump<S>(
        &mut self,
        direction: Direction,
        tiles: u8,
        snapshot: NeighborSnapshot,
        env: &mut MotionEnv<'_, '_, S>,
    ) where
        S: TerrainSource + ?Sized,
    {
        self.leave_cell(env.effects);
        self.face(direction, env.out);
        let landing_cell = self.cell.step(direction, i32::from(tiles));
        let origin = self.position;
        let landing = landing_cell.to_vec2();
        let apex = origin.lerp(landing, 0.5);
        self.jump = Some(JumpArc {
            height: env.settings.jump_height,
            direction: direction.unit_vector(),
            tiles,
            source_reflective: snapshot.on_tile().is_some_and(|tile| tile.is_reflective()),
            origin,
            apex,
            landing,
        });
        self.last_position = origin;
        self.destination = landing_cell;
        self.target = apex;
        self.pending_layer_delta = 0;
        self.flags.moving = true;
        self.flags.jumping = true;
        self.flags.falling = false;
        self.flags.tile_activated = false;
        self.snapshot = Some(snapshot);
        debug!(actor = self.id.get(), from = ?self.cell, landing = ?landing_cell, tiles, "jump_started");
        env.out.push(Event::JumpStarted {
            actor: self.id,
            from: self.cell,
            landing: landing_cell,
            tiles,
        });
    }

    fn settle<S>(&mut self, env: &mut MotionEnv<'_, '_, S>)
    where
        S: TerrainSource + ?Sized,
    {
        let snapshot = env.resolver.snapshot(self.cell, self.layer, self.facing);
        self.flags.on_stairs = derive_on_stairs(&snapshot);
        self.snapshot = Some(snapshot);
        self.refresh_sorting(env.out);
        let _ = self.activate_tile(env);
    }

    fn leave_cell(&mut self, effects: &mut Effects) {
        if let Some((layer, cell)) = self.last_splash.take() {
            let _ = effects.stop_splash(layer, cell);
        }
    }

    fn face(&mut self, direction: Direction, out: &mut Vec<Event>) {
        if self.lock_direction || self.facing == direction {
            return;
        }
        self.facing = direction;
        self.target_angle = direction.angle_degrees();
        self.flags.rotating = true;
        out.push(Event::FacingChanged {
            actor: self.id,
            direction,
        });
    }

    fn refresh_sorting(&mut self, out: &mut Vec<Event>) {
        let order = sorting_order(self.layer, self.flags.on_stairs);
        if order != self.sorting_order {
            self.sorting_order = order;
            out.push(Event::SortingOrderChanged {
                actor: self.id,
                order,
            });
        }
    }

    fn rotate(&mut self, dt: Duration, settings: &Settings) {
        if !self.flags.rotating {
            return;
        }
        let delta = (self.target_angle - self.angle + 540.0).rem_euclid(360.0) - 180.0;
        let max_turn = settings.turn_speed_degrees * dt.as_secs_f32();
        if delta.abs() <= max_turn {
            self.angle = self.target_angle;
            self.flags.rotating = false;
        } else {
            self.angle = (self.angle + max_turn.copysign(delta)).rem_euclid(360.0);
        }
    }

    fn visual_layer(&self) -> f32 {
        let base = self.layer.get() as f32;
        if self.pending_layer_delta == 0 {
            return base;
        }
        base + self.pending_layer_delta as f32 * progress(self.last_position, self.target, self.position)
    }

    fn arc_height(&self) -> f32 {
        let Some(arc) = &self.jump else {
            return 0.0;
        };
        if self.flags.jumping {
            let t = progress(arc.origin, arc.apex, self.position);
            arc.height * (1.0 - (1.0 - t) * (1.0 - t))
        } else {
            let t = progress(arc.apex, arc.landing, self.position);
            arc.height * (1.0 - t * t)
        }
    }
}

fn progress(from: Vec2, to: Vec2, at: Vec2) -> f32 {
    let total = from.distance(to);
    if total <= f32::EPSILON {
        return 1.0;
    }
    (1.0 - at.distance(to) / total).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_runs_from_zero_to_one() {
        let from = Vec2::new(0.0, 0.0);
        let to = Vec2::new(2.0, 0.0);
        assert_eq!(progress(from, to, from), 0.0);
        assert_eq!(progress(from, to, Vec2::new(1.0, 0.0)), 0.5);
        assert_eq!(progress(from, to, to), 1.0);
        assert_eq!(progress(to, to, to), 1.0);
    }
}
