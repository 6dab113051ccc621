//! Gameplay tuning for the arena
//!
//! Every constant the core consults lives in [`ArenaConfig`]. The defaults
//! are the values the server ships with; `main.rs` overrides a few of them
//! from the command line and can load the whole block from a JSON file.

use serde::Deserialize;
use shared::{GRID_HEIGHT, GRID_WIDTH};
use std::path::Path;
use std::time::Duration;

/// Upper bound on match and modifier timers so deadlines stay representable.
pub const MAX_TIMER_MS: u64 = 365 * 24 * 60 * 60 * 1000;

/// Inclusive range a requested stat is clamped into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct StatRange {
    pub min: i32,
    pub max: i32,
}

impl StatRange {
    pub const fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, value: i32) -> i32 {
        value.clamp(self.min, self.max)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    pub grid_width: i32,
    pub grid_height: i32,

    pub hp_max: StatRange,
    pub atk: StatRange,
    pub def: StatRange,
    pub heal_power: StatRange,
    pub power: StatRange,

    pub attack_cooldown_ms: u64,
    pub heal_cooldown_ms: u64,
    pub defend_cooldown_ms: u64,
    pub max_heals: u32,
    pub max_defends: u32,

    pub match_duration_ms: u64,
    pub modifier_interval_ms: u64,
    pub power_penalty: i32,
    pub no_damage_chance: f64,
    pub teleport_chance: f64,
    pub slow_multiplier: f64,
    pub fast_multiplier: f64,

    pub event_log_capacity: usize,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            grid_width: GRID_WIDTH,
            grid_height: GRID_HEIGHT,

            hp_max: StatRange::new(50, 500),
            atk: StatRange::new(1, 60),
            def: StatRange::new(0, 40),
            heal_power: StatRange::new(0, 60),
            power: StatRange::new(1000, 9999),

            attack_cooldown_ms: 700,
            heal_cooldown_ms: 2500,
            defend_cooldown_ms: 2000,
            max_heals: 3,
            max_defends: 3,

            match_duration_ms: 120_000,
            modifier_interval_ms: 10_000,
            power_penalty: 1500,
            no_damage_chance: 0.35,
            teleport_chance: 0.5,
            slow_multiplier: 1.5,
            fast_multiplier: 0.6,

            event_log_capacity: 30,
        }
    }
}

impl ArenaConfig {
    /// Reads a JSON file. Missing fields fall back to the defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let raw = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// Applies command line overrides given in whole seconds.
    pub fn override_timers(&mut self, match_secs: Option<u64>, modifier_secs: Option<u64>) {
        if let Some(secs) = match_secs {
            self.match_duration_ms = secs.saturating_mul(1000);
        }
        if let Some(secs) = modifier_secs {
            self.modifier_interval_ms = secs.saturating_mul(1000);
        }
    }

    pub fn match_duration(&self) -> Duration {
        Duration::from_millis(self.match_duration_ms.min(MAX_TIMER_MS))
    }

    pub fn modifier_interval(&self) -> Duration {
        Duration::from_millis(self.modifier_interval_ms.min(MAX_TIMER_MS))
    }
}
