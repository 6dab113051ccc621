//! Timed buffs and debuffs
//!
//! Each modifier is a single expiry instant. A modifier is active while
//! `now < expiry`; nothing sweeps expired entries, readers evaluate the
//! predicate at the moment they need it. The only exception is the cosmetic
//! stink flag, which the registry clears through a deferred task so clients
//! see it go away.

use crate::config::ArenaConfig;
use shared::{ActiveStatus, ModifierKind};
use std::time::Instant;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusTimers {
    pub no_damage_until: Option<Instant>,
    pub half_damage_taken_until: Option<Instant>,
    pub cooldown_slow_until: Option<Instant>,
    pub cooldown_fast_until: Option<Instant>,
    pub power_penalty_until: Option<Instant>,
    pub disabled_until: Option<Instant>,
}

impl StatusTimers {
    fn slot(&self, kind: ModifierKind) -> Option<Instant> {
        match kind {
            ModifierKind::NoDamage => self.no_damage_until,
            ModifierKind::HalfDamage => self.half_damage_taken_until,
            ModifierKind::CooldownSlow => self.cooldown_slow_until,
            ModifierKind::CooldownFast => self.cooldown_fast_until,
            ModifierKind::PowerPenalty => self.power_penalty_until,
            ModifierKind::Stink => self.disabled_until,
        }
    }

    fn slot_mut(&mut self, kind: ModifierKind) -> &mut Option<Instant> {
        match kind {
            ModifierKind::NoDamage => &mut self.no_damage_until,
            ModifierKind::HalfDamage => &mut self.half_damage_taken_until,
            ModifierKind::CooldownSlow => &mut self.cooldown_slow_until,
            ModifierKind::CooldownFast => &mut self.cooldown_fast_until,
            ModifierKind::PowerPenalty => &mut self.power_penalty_until,
            ModifierKind::Stink => &mut self.disabled_until,
        }
    }

    /// Overwrites the expiry. Re-applying a kind never stacks.
    pub fn apply(&mut self, kind: ModifierKind, until: Instant) {
        *self.slot_mut(kind) = Some(until);
    }

    pub fn clear(&mut self, kind: ModifierKind) {
        *self.slot_mut(kind) = None;
    }

    pub fn clear_all(&mut self) {
        *self = Self::default();
    }

    pub fn is_active(&self, kind: ModifierKind, now: Instant) -> bool {
        self.slot(kind).is_some_and(|until| now < until)
    }

    pub fn expiry(&self, kind: ModifierKind) -> Option<Instant> {
        self.slot(kind)
    }

    /// Slow beats fast when both are running.
    pub fn cooldown_multiplier(&self, now: Instant, config: &ArenaConfig) -> f64 {
        if self.is_active(ModifierKind::CooldownSlow, now) {
            config.slow_multiplier
        } else if self.is_active(ModifierKind::CooldownFast, now) {
            config.fast_multiplier
        } else {
            1.0
        }
    }

    pub fn effective_power(&self, base: i32, now: Instant, config: &ArenaConfig) -> i32 {
        if self.is_active(ModifierKind::PowerPenalty, now) {
            (base - config.power_penalty).max(0)
        } else {
            base
        }
    }

    /// Active modifiers with their remaining time, in catalog order.
    pub fn active(&self, now: Instant) -> Vec<ActiveStatus> {
        ModifierKind::MALUS
            .iter()
            .chain(ModifierKind::BONUS.iter())
            .filter_map(|&kind| {
                let until = self.slot(kind)?;
                (now < until).then(|| ActiveStatus {
                    kind,
                    remaining_ms: until.duration_since(now).as_millis() as u64,
                })
            })
            .collect()
    }
}
