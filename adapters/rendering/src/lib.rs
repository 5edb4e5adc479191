#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Presentation contracts for Strata adapters.
//!
//! The simulation never draws anything itself. It broadcasts visibility and
//! effect events that adapters forward to a [`VisibilitySink`] and an
//! [`EffectsSink`] through [`dispatch`]. [`SceneVisibility`] and [`EffectLog`]
//! are in-memory sinks used by the demo driver and tests.

use std::{
    collections::{HashMap, HashSet},
    error::Error,
    fmt,
};

use anyhow::Result as AnyResult;
use strata_core::{ActorId, EffectRequest, Event, GridPos, LayerIndex, PrefabId, SubGridId};

/// Receives opacity, draw-order and camera changes.
pub trait VisibilitySink {
    /// Sets the opacity of a tile.
    fn set_tile_alpha(&mut self, layer: LayerIndex, cell: GridPos, sub_grid: SubGridId, alpha: f32);

    /// Sets the opacity of a prefab scene entity.
    fn set_prefab_alpha(&mut self, prefab: PrefabId, alpha: f32);

    /// Sets the sprite sorting order of an actor.
    fn set_sorting_order(&mut self, actor: ActorId, order: i32);

    /// Tilts the camera following an actor that dives or surfaces.
    fn set_camera_tilt(&mut self, actor: ActorId, underwater: bool);
}

/// Spawns ambient effects.
pub trait EffectsSink {
    /// Starts or stops the effect described by `request`.
    fn spawn(&mut self, request: EffectRequest) -> AnyResult<()>;
}

/// Forwards every presentation event to the sinks, in order.
///
/// Events without a presentation counterpart are skipped. The first effect
/// the sink refuses aborts the dispatch.
pub fn dispatch<V, E>(events: &[Event], visibility: &mut V, effects: &mut E) -> AnyResult<()>
where
    V: VisibilitySink + ?Sized,
    E: EffectsSink + ?Sized,
{
    for event in events {
        match *event {
            Event::TileVisibility {
                layer,
                cell,
                sub_grid,
                alpha,
            } => visibility.set_tile_alpha(layer, cell, sub_grid, alpha),
            Event::PrefabVisibility { prefab, alpha } => visibility.set_prefab_alpha(prefab, alpha),
            Event::SortingOrderChanged { actor, order } => visibility.set_sorting_order(actor, order),
            Event::UnderwaterChanged { actor, underwater } => {
                visibility.set_camera_tilt(actor, underwater);
            }
            Event::EffectRequested { request } => effects.spawn(request)?,
            _ => {}
        }
    }
    Ok(())
}

type TileKey = (LayerIndex, GridPos, SubGridId);

/// Visibility state accumulated from events.
///
/// Only faded tiles and prefabs are stored; everything else is opaque.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SceneVisibility {
    tiles: HashMap<TileKey, f32>,
    prefabs: HashMap<PrefabId, f32>,
    sorting: HashMap<ActorId, i32>,
    tilted: HashSet<ActorId>,
}

impl SceneVisibility {
    /// Creates a fully opaque scene.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opacity of a tile.
    #[must_use]
    pub fn tile_alpha(&self, layer: LayerIndex, cell: GridPos, sub_grid: SubGridId) -> f32 {
        self.tiles
            .get(&(layer, cell, sub_grid))
            .copied()
            .unwrap_or(1.0)
    }

    /// Opacity of a prefab.
    #[must_use]
    pub fn prefab_alpha(&self, prefab: PrefabId) -> f32 {
        self.prefabs.get(&prefab).copied().unwrap_or(1.0)
    }

    /// Sorting order last reported for an actor.
    #[must_use]
    pub fn sorting_order(&self, actor: ActorId) -> Option<i32> {
        self.sorting.get(&actor).copied()
    }

    /// Whether the camera following an actor is tilted underwater.
    #[must_use]
    pub fn is_tilted(&self, actor: ActorId) -> bool {
        self.tilted.contains(&actor)
    }

    /// Number of tiles that are not fully opaque.
    #[must_use]
    pub fn faded_tiles(&self) -> usize {
        self.tiles.len()
    }
}

impl VisibilitySink for SceneVisibility {
    fn set_tile_alpha(&mut self, layer: LayerIndex, cell: GridPos, sub_grid: SubGridId, alpha: f32) {
        let key = (layer, cell, sub_grid);
        if alpha >= 1.0 {
            let _ = self.tiles.remove(&key);
        } else {
            let _ = self.tiles.insert(key, alpha);
        }
    }

    fn set_prefab_alpha(&mut self, prefab: PrefabId, alpha: f32) {
        if alpha >= 1.0 {
            let _ = self.prefabs.remove(&prefab);
        } else {
            let _ = self.prefabs.insert(prefab, alpha);
        }
    }

    fn set_sorting_order(&mut self, actor: ActorId, order: i32) {
        let _ = self.sorting.insert(actor, order);
    }

    fn set_camera_tilt(&mut self, actor: ActorId, underwater: bool) {
        if underwater {
            let _ = self.tilted.insert(actor);
        } else {
            let _ = self.tilted.remove(&actor);
        }
    }
}

/// Effect requests recorded in arrival order, with splash bookkeeping.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EffectLog {
    requests: Vec<EffectRequest>,
    splashes: HashSet<(LayerIndex, GridPos)>,
}

impl EffectLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request accepted so far.
    #[must_use]
    pub fn requests(&self) -> &[EffectRequest] {
        &self.requests
    }

    /// Number of splashes currently playing.
    #[must_use]
    pub fn active_splashes(&self) -> usize {
        self.splashes.len()
    }
}

impl EffectsSink for EffectLog {
    fn spawn(&mut self, request: EffectRequest) -> AnyResult<()> {
        match request {
            EffectRequest::SplashStarted { layer, cell } => {
                if !self.splashes.insert((layer, cell)) {
                    return Err(RenderingError::SplashAlreadyPlaying { layer, cell }.into());
                }
            }
            EffectRequest::SplashStopped { layer, cell } => {
                if !self.splashes.remove(&(layer, cell)) {
                    return Err(RenderingError::SplashNotPlaying { layer, cell }.into());
                }
            }
            EffectRequest::GrassRustle { .. } | EffectRequest::Footprint { .. } => {}
        }
        self.requests.push(request);
        Ok(())
    }
}

/// Errors raised by the recording sinks.
#[derive(Debug, PartialEq, Eq)]
pub enum RenderingError {
    /// A splash was started on a cell where one already plays.
    SplashAlreadyPlaying {
        /// Layer of the splash.
        layer: LayerIndex,
        /// Cell of the splash.
        cell: GridPos,
    },
    /// A splash was stopped on a cell where none plays.
    SplashNotPlaying {
        /// Layer of the splash.
        layer: LayerIndex,
        /// Cell of the splash.
        cell: GridPos,
    },
}

impl fmt::Display for RenderingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SplashAlreadyPlaying { layer, cell } => write!(
                f,
                "splash already playing at ({}, {}) on layer {}",
                cell.x(),
                cell.y(),
                layer.get()
            ),
            Self::SplashNotPlaying { layer, cell } => write!(
                f,
                "no splash playing at ({}, {}) on layer {}",
                cell.x(),
                cell.y(),
                layer.get()
            ),
        }
    }
}

impl Error for RenderingError {}

#[cfg(test)]
mod tests {
    use super::*;

    const LAYER: LayerIndex = LayerIndex::new(1);

    #[test]
    fn restoring_full_opacity_forgets_the_tile() {
        let mut scene = SceneVisibility::new();
        let cell = GridPos::new(3, 4);
        scene.set_tile_alpha(LAYER, cell, SubGridId::Ground, 0.35);
        assert_eq!(scene.tile_alpha(LAYER, cell, SubGridId::Ground), 0.35);
        assert_eq!(scene.faded_tiles(), 1);

        scene.set_tile_alpha(LAYER, cell, SubGridId::Ground, 1.0);
        assert_eq!(scene.tile_alpha(LAYER, cell, SubGridId::Ground), 1.0);
        assert_eq!(scene.faded_tiles(), 0);
    }

    #[test]
    fn dispatch_routes_events_to_both_sinks() {
        let actor = ActorId::new(0);
        let cell = GridPos::new(1, 1);
        let events = [
            Event::TimeAdvanced {
                dt: std::time::Duration::from_millis(16),
            },
            Event::TileVisibility {
                layer: LAYER,
                cell,
                sub_grid: SubGridId::Object(0),
                alpha: 0.0,
            },
            Event::PrefabVisibility {
                prefab: PrefabId::new(4),
                alpha: 0.35,
            },
            Event::SortingOrderChanged { actor, order: 15 },
            Event::UnderwaterChanged {
                actor,
                underwater: true,
            },
            Event::EffectRequested {
                request: EffectRequest::GrassRustle { layer: LAYER, cell },
            },
        ];
        let mut scene = SceneVisibility::new();
        let mut effects = EffectLog::new();

        dispatch(&events, &mut scene, &mut effects).expect("dispatch succeeds");
        assert_eq!(scene.tile_alpha(LAYER, cell, SubGridId::Object(0)), 0.0);
        assert_eq!(scene.prefab_alpha(PrefabId::new(4)), 0.35);
        assert_eq!(scene.sorting_order(actor), Some(15));
        assert!(scene.is_tilted(actor));
        assert_eq!(effects.requests().len(), 1);
    }

    #[test]
    fn unmatched_splash_stop_is_an_error() {
        let mut effects = EffectLog::new();
        let cell = GridPos::new(0, 0);
        let error = effects
            .spawn(EffectRequest::SplashStopped { layer: LAYER, cell })
            .expect_err("nothing to stop");
        assert_eq!(
            error.downcast_ref::<RenderingError>(),
            Some(&RenderingError::SplashNotPlaying { layer: LAYER, cell }),
        );
        assert_eq!(effects.active_splashes(), 0);
    }
}
