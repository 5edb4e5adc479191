//! Read-only configuration consumed by every system.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::SpeedClass;

/// Global toggles and tuning constants.
///
/// Every field has a default so partial configuration files are accepted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Allows actors to enter and leave surface water.
    pub allow_swimming: bool,
    /// Allows jumps to pass over cells covered by blocking objects.
    pub allow_jump_over_objects: bool,
    /// Allows ledges to be jumped against their passage direction.
    pub allow_jump_up_ledges: bool,
    /// Allows actors to walk into cells covered by hideable upper terrain.
    pub allow_walk_behind_terrain_edges: bool,
    /// Fades bridges above the viewer.
    pub see_through_bridges: bool,
    /// Fades upper terrain in front of the viewer.
    pub see_through_terrain: bool,
    /// Fades prefabs covering the viewer.
    pub see_through_prefabs: bool,
    /// Movement speed per speed class, in cells per second.
    pub speeds: SpeedTable,
    /// Apex height of a jump, in cells.
    pub jump_height: f32,
    /// Vertical distance between two layers, in cells.
    pub layer_height_spacing: f32,
    /// Speed of jumps covering two or more cells, in cells per second.
    pub jump_speed_fast: f32,
    /// Speed of single-cell jumps, in cells per second.
    pub jump_speed_moderate: f32,
    /// Longest forward jump honoured; longer requests fall back to shorter ones.
    pub max_jump_tiles: u8,
    /// Facing rotation speed in degrees per second.
    pub turn_speed_degrees: f32,
    /// Opacity applied to faded occluders.
    pub occlusion_alpha: f32,
    /// Delays used by ambient effect tasks.
    pub effects: EffectTiming,
    /// Seed for random turns.
    pub rng_seed: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            allow_swimming: false,
            allow_jump_over_objects: false,
            allow_jump_up_ledges: false,
            allow_walk_behind_terrain_edges: true,
            see_through_bridges: true,
            see_through_terrain: true,
            see_through_prefabs: true,
            speeds: SpeedTable::default(),
            jump_height: 0.5,
            layer_height_spacing: 1.0,
            jump_speed_fast: 8.0,
            jump_speed_moderate: 5.0,
            max_jump_tiles: 2,
            turn_speed_degrees: 720.0,
            occlusion_alpha: 0.35,
            effects: EffectTiming::default(),
            rng_seed: 0x5eed_0f_57a7a,
        }
    }
}

impl Settings {
    /// Translation speed of the provided class in cells per second.
    #[must_use]
    pub fn units_per_second(&self, speed: SpeedClass) -> f32 {
        self.speeds.get(speed)
    }

    /// Speed of a jump leg covering `tiles` cells.
    #[must_use]
    pub fn jump_speed(&self, tiles: u8) -> f32 {
        if tiles >= 2 {
            self.jump_speed_fast
        } else {
            self.jump_speed_moderate
        }
    }
}

/// Cells-per-second lookup keyed by [`SpeedClass`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedTable {
    /// Speed of [`SpeedClass::Slow`].
    pub slow: f32,
    /// Speed of [`SpeedClass::Walk`].
    pub walk: f32,
    /// Speed of [`SpeedClass::Run`].
    pub run: f32,
    /// Speed of [`SpeedClass::Cycle`].
    pub cycle: f32,
}

impl SpeedTable {
    /// Speed configured for a class.
    #[must_use]
    pub const fn get(&self, speed: SpeedClass) -> f32 {
        match speed {
            SpeedClass::Slow => self.slow,
            SpeedClass::Walk => self.walk,
            SpeedClass::Run => self.run,
            SpeedClass::Cycle => self.cycle,
        }
    }
}

impl Default for SpeedTable {
    fn default() -> Self {
        Self {
            slow: 2.0,
            walk: 4.0,
            run: 8.0,
            cycle: 12.0,
        }
    }
}

/// Real-time delays of the ambient effect tasks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectTiming {
    /// Delay before a stopped shore splash is removed.
    pub splash_kill_delay_ms: u64,
    /// Delay before footprints appear behind walking actors.
    pub footprint_delay_walk_ms: u64,
    /// Delay before footprints appear behind faster actors.
    pub footprint_delay_run_ms: u64,
}

impl EffectTiming {
    /// Delay before a stopped splash is removed.
    #[must_use]
    pub const fn splash_kill_delay(&self) -> Duration {
        Duration::from_millis(self.splash_kill_delay_ms)
    }

    /// Delay before footprints appear for the provided speed class.
    #[must_use]
    pub const fn footprint_delay(&self, speed: SpeedClass) -> Duration {
        match speed {
            SpeedClass::Slow | SpeedClass::Walk => {
                Duration::from_millis(self.footprint_delay_walk_ms)
            }
            SpeedClass::Run | SpeedClass::Cycle => {
                Duration::from_millis(self.footprint_delay_run_ms)
            }
        }
    }
}

impl Default for EffectTiming {
    fn default() -> Self {
        Self {
            splash_kill_delay_ms: 400,
            footprint_delay_walk_ms: 180,
            footprint_delay_run_ms: 90,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_files_keep_defaults() {
        let settings: Settings = toml::from_str(
            "allow_swimming = true\n[speeds]\nrun = 10.0\n[effects]\nsplash_kill_delay_ms = 50\n",
        )
        .expect("parse settings");

        assert!(settings.allow_swimming);
        assert!(settings.see_through_bridges);
        assert_eq!(settings.speeds.run, 10.0);
        assert_eq!(settings.speeds.walk, SpeedTable::default().walk);
        assert_eq!(
            settings.effects.splash_kill_delay(),
            Duration::from_millis(50)
        );
        assert_eq!(settings.max_jump_tiles, 2);
    }

    #[test]
    fn jump_speed_depends_on_distance() {
        let settings = Settings::default();
        assert_eq!(settings.jump_speed(2), settings.jump_speed_fast);
        assert_eq!(settings.jump_speed(1), settings.jump_speed_moderate);
    }

    #[test]
    fn footprints_follow_speed_class() {
        let timing = EffectTiming::default();
        assert!(timing.footprint_delay(SpeedClass::Run) < timing.footprint_delay(SpeedClass::Walk));
    }
}
