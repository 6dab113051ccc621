//! Per-seat combatant state
//!
//! A [`Player`] is created when a client takes a seat and lives until the
//! seat is vacated. Requested stats are clamped into the configured ranges on
//! construction, and `hp` is clamped into `[0, hp_max]` by every mutator, so
//! nothing a client sends can put a player into an invalid state.

use crate::config::ArenaConfig;
use crate::status::StatusTimers;
use shared::{ClientId, PlayerView, Position, Seat, StatsRequest, MAX_NAME_LEN};
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct Player {
    /// Session identity bound to this seat. Never projected to clients.
    pub client_id: ClientId,
    pub seat: Seat,
    pub name: String,
    pub position: Position,
    pub hp: i32,
    pub hp_max: i32,
    pub atk: i32,
    pub def: i32,
    pub heal_power: i32,
    pub power: i32,
    pub shield: i32,
    pub heals_left: u32,
    pub defends_left: u32,
    pub status: StatusTimers,
}

impl Player {
    pub fn new(
        client_id: ClientId,
        seat: Seat,
        name: &str,
        stats: &StatsRequest,
        config: &ArenaConfig,
    ) -> Self {
        let hp_max = config.hp_max.clamp(stats.hp_max);

        Self {
            client_id,
            seat,
            name: sanitize_name(name, seat),
            position: spawn_position(seat, config),
            hp: hp_max,
            hp_max,
            atk: config.atk.clamp(stats.atk),
            def: config.def.clamp(stats.def),
            heal_power: config.heal_power.clamp(stats.heal_power),
            power: config.power.clamp(stats.power),
            shield: 0,
            heals_left: config.max_heals,
            defends_left: config.max_defends,
            status: StatusTimers::default(),
        }
    }

    /// Puts the player back to spawn defaults for a fresh match.
    pub fn reset_for_match(&mut self, config: &ArenaConfig) {
        self.position = spawn_position(self.seat, config);
        self.hp = self.hp_max;
        self.shield = 0;
        self.heals_left = config.max_heals;
        self.defends_left = config.max_defends;
        self.status.clear_all();
    }

    pub fn set_hp(&mut self, hp: i32) {
        self.hp = hp.clamp(0, self.hp_max);
    }

    /// Returns the hp actually lost.
    pub fn take_damage(&mut self, amount: i32) -> i32 {
        let before = self.hp;
        self.set_hp(self.hp - amount.max(0));
        before - self.hp
    }

    /// Returns the hp actually restored.
    pub fn heal(&mut self, amount: i32) -> i32 {
        let before = self.hp;
        self.set_hp(self.hp + amount.max(0));
        self.hp - before
    }

    pub fn add_shield(&mut self, amount: i32) {
        self.shield += amount.max(0);
    }

    /// Soaks `damage` into the shield. Returns `(blocked, remaining)`.
    pub fn absorb(&mut self, damage: i32) -> (i32, i32) {
        let damage = damage.max(0);
        let blocked = damage.min(self.shield);
        self.shield -= blocked;
        (blocked, damage - blocked)
    }

    pub fn is_down(&self) -> bool {
        self.hp == 0
    }

    pub fn effective_power(&self, now: Instant, config: &ArenaConfig) -> i32 {
        self.status.effective_power(self.power, now, config)
    }

    pub fn view(&self, now: Instant, config: &ArenaConfig) -> PlayerView {
        PlayerView {
            seat: self.seat,
            name: self.name.clone(),
            position: self.position,
            hp: self.hp,
            hp_max: self.hp_max,
            atk: self.atk,
            def: self.def,
            heal_power: self.heal_power,
            power: self.power,
            effective_power: self.effective_power(now, config),
            shield: self.shield,
            heals_left: self.heals_left,
            defends_left: self.defends_left,
            statuses: self.status.active(now),
        }
    }
}

pub fn spawn_position(seat: Seat, config: &ArenaConfig) -> Position {
    match seat {
        Seat::A => Position::new(0, 0),
        Seat::B => Position::new(config.grid_width - 1, config.grid_height - 1),
    }
}

fn sanitize_name(name: &str, seat: Seat) -> String {
    let trimmed: String = name.trim().chars().take(MAX_NAME_LEN).collect();
    if trimmed.is_empty() {
        format!("Player {}", seat)
    } else {
        trimmed
    }
}
