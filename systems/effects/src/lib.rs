#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Single-threaded executor for ambient effect tasks.
//!
//! Footprints and shore splash removals are scheduled as [`EffectTask`] values
//! that resume once enough simulated time elapsed. Splash bookkeeping is kept
//! per cell so a splash is never started twice and a pending removal is
//! cancelled when the splash is restarted.

use std::{
    collections::{HashMap, HashSet},
    time::Duration,
};

use strata_core::{
    Direction, EffectRequest, EffectTiming, Event, GridPos, LayerIndex, SpeedClass,
};
use tracing::trace;

/// Identifier of a scheduled task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    /// Numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Work performed when a task resumes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EffectAction {
    /// Forwards a request to the effects collaborator.
    Emit(EffectRequest),
    /// Ends the splash playing at a cell.
    KillSplash {
        /// Layer containing the splash.
        layer: LayerIndex,
        /// Cell containing the splash.
        cell: GridPos,
    },
}

/// A task waiting for simulated time to elapse.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EffectTask {
    id: TaskId,
    remaining: Duration,
    action: EffectAction,
}

impl EffectTask {
    /// Identifier of the task.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Time left before the task resumes.
    #[must_use]
    pub const fn remaining(&self) -> Duration {
        self.remaining
    }

    /// Work performed on resumption.
    #[must_use]
    pub const fn action(&self) -> EffectAction {
        self.action
    }
}

type CellKey = (LayerIndex, GridPos);

/// Per-map effect executor and splash tracking tables.
#[derive(Debug)]
pub struct Effects {
    timing: EffectTiming,
    tasks: Vec<EffectTask>,
    next_task: u64,
    active_splashes: HashSet<CellKey>,
    pending_kills: HashMap<CellKey, TaskId>,
}

impl Effects {
    /// Creates an idle executor.
    #[must_use]
    pub fn new(timing: EffectTiming) -> Self {
        Self {
            timing,
            tasks: Vec::new(),
            next_task: 0,
            active_splashes: HashSet::new(),
            pending_kills: HashMap::new(),
        }
    }

    /// Requests a grass rustle immediately.
    pub fn grass_rustle(&mut self, layer: LayerIndex, cell: GridPos, out: &mut Vec<Event>) {
        out.push(Event::EffectRequested {
            request: EffectRequest::GrassRustle { layer, cell },
        });
    }

    /// Schedules footprints behind an actor, delayed by its speed class.
    pub fn footprint(
        &mut self,
        layer: LayerIndex,
        cell: GridPos,
        direction: Direction,
        speed: SpeedClass,
    ) -> TaskId {
        let delay = self.timing.footprint_delay(speed);
        self.schedule(
            delay,
            EffectAction::Emit(EffectRequest::Footprint {
                layer,
                cell,
                direction,
                speed,
            }),
        )
    }

    /// Starts the splash at a cell.
    ///
    /// A pending removal for the cell is cancelled. Returns `false` without
    /// emitting anything when the splash is already playing.
    pub fn start_splash(&mut self, layer: LayerIndex, cell: GridPos, out: &mut Vec<Event>) -> bool {
        let key = (layer, cell);
        if let Some(kill) = self.pending_kills.remove(&key) {
            let _ = self.cancel(kill);
        }
        if !self.active_splashes.insert(key) {
            return false;
        }
        out.push(Event::EffectRequested {
            request: EffectRequest::SplashStarted { layer, cell },
        });
        true
    }

    /// Schedules the removal of the splash at a cell.
    ///
    /// Returns `None` when no splash plays there or a removal is already due.
    pub fn stop_splash(&mut self, layer: LayerIndex, cell: GridPos) -> Option<TaskId> {
        let key = (layer, cell);
        if !self.active_splashes.contains(&key) || self.pending_kills.contains_key(&key) {
            return None;
        }
        let delay = self.timing.splash_kill_delay();
        let id = self.schedule(delay, EffectAction::KillSplash { layer, cell });
        let _ = self.pending_kills.insert(key, id);
        Some(id)
    }

    /// Cancels a scheduled task. Returns `false` if it already ran.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        let Some(index) = self.tasks.iter().position(|task| task.id == id) else {
            return false;
        };
        let task = self.tasks.remove(index);
        if let EffectAction::KillSplash { layer, cell } = task.action {
            if self.pending_kills.get(&(layer, cell)) == Some(&id) {
                let _ = self.pending_kills.remove(&(layer, cell));
            }
        }
        true
    }

    /// Advances every task and runs those whose delay elapsed, oldest first.
    pub fn tick(&mut self, dt: Duration, out: &mut Vec<Event>) {
        if self.tasks.is_empty() {
            return;
        }
        for task in &mut self.tasks {
            task.remaining = task.remaining.saturating_sub(dt);
        }
        let (due, waiting): (Vec<EffectTask>, Vec<EffectTask>) = std::mem::take(&mut self.tasks)
            .into_iter()
            .partition(|task| task.remaining.is_zero());
        self.tasks = waiting;

        for task in due {
            trace!(task = task.id.get(), action = ?task.action, "effect_task_resumed");
            match task.action {
                EffectAction::Emit(request) => out.push(Event::EffectRequested { request }),
                EffectAction::KillSplash { layer, cell } => {
                    let key = (layer, cell);
                    let _ = self.pending_kills.remove(&key);
                    if self.active_splashes.remove(&key) {
                        out.push(Event::EffectRequested {
                            request: EffectRequest::SplashStopped { layer, cell },
                        });
                    }
                }
            }
        }
    }

    /// Reports whether a splash plays at a cell.
    #[must_use]
    pub fn is_splash_active(&self, layer: LayerIndex, cell: GridPos) -> bool {
        self.active_splashes.contains(&(layer, cell))
    }

    /// Reports whether the splash at a cell is scheduled for removal.
    #[must_use]
    pub fn is_kill_pending(&self, layer: LayerIndex, cell: GridPos) -> bool {
        self.pending_kills.contains_key(&(layer, cell))
    }

    /// Tasks still waiting, oldest first.
    #[must_use]
    pub fn pending(&self) -> &[EffectTask] {
        &self.tasks
    }

    fn schedule(&mut self, delay: Duration, action: EffectAction) -> TaskId {
        let id = TaskId(self.next_task);
        self.next_task += 1;
        self.tasks.push(EffectTask {
            id,
            remaining: delay,
            action,
        });
        id
    }
}
