//! Periodic random modifiers
//!
//! While a match runs, every `modifier_interval` one seat picks up a random
//! bonus or malus for exactly one interval. Each application overwrites the
//! previous expiry of that kind. Clients get an `IncomingThrow` notification
//! so they can animate the projectile; it has no other effect.

use crate::config::ArenaConfig;
use crate::room::Room;
use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;
use shared::{MatchPhase, ModifierKind, Notification, Seat, ThrowOrigin};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModifierRoll {
    pub target: Seat,
    pub kind: ModifierKind,
    pub origin: ThrowOrigin,
}

/// Clears the cosmetic stink flag once it expires.
///
/// Carries the match generation it was scheduled under. A reset or a new
/// match bumps the room generation, which turns the task into a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredClear {
    pub code: String,
    pub seat: Seat,
    pub generation: u64,
    pub due: Instant,
}

#[derive(Debug, Clone)]
pub struct ModifierTick {
    pub notification: Notification,
    pub deferred: Option<DeferredClear>,
}

/// Uniform seat, uniform polarity, then uniform kind within the polarity.
pub fn roll<R: Rng + ?Sized>(rng: &mut R) -> ModifierRoll {
    let target = if rng.gen_bool(0.5) { Seat::A } else { Seat::B };
    let catalog: &[ModifierKind] = if rng.gen_bool(0.5) {
        &ModifierKind::BONUS
    } else {
        &ModifierKind::MALUS
    };
    let kind = catalog.choose(rng).copied().unwrap_or(ModifierKind::Stink);
    let origin = ThrowOrigin::ALL
        .choose(rng)
        .copied()
        .unwrap_or(ThrowOrigin::North);

    ModifierRoll {
        target,
        kind,
        origin,
    }
}

/// Applies a modifier if the room's interval has elapsed, then re-arms it.
pub fn apply_due<R: Rng + ?Sized>(
    room: &mut Room,
    now: Instant,
    rng: &mut R,
    config: &ArenaConfig,
) -> Option<ModifierTick> {
    if room.phase != MatchPhase::Running {
        return None;
    }
    let due = room.next_modifier_at?;
    if now < due {
        return None;
    }

    let until = now + config.modifier_interval();
    room.next_modifier_at = Some(until);

    let roll = roll(rng);
    let player = room.player_mut(roll.target)?;
    player.status.apply(roll.kind, until);
    let name = player.name.clone();

    let label = if roll.kind.is_bonus() { "bonus" } else { "malus" };
    room.log(format!("{} catches a {} ({})", name, label, roll.kind));
    debug!(
        "room {}: {} -> seat {} from {:?}",
        room.code, roll.kind, roll.target, roll.origin
    );

    let deferred = (roll.kind == ModifierKind::Stink).then(|| DeferredClear {
        code: room.code.clone(),
        seat: roll.target,
        generation: room.generation,
        due: until,
    });

    Some(ModifierTick {
        notification: Notification::IncomingThrow {
            target: roll.target,
            modifier: roll.kind,
            origin: roll.origin,
        },
        deferred,
    })
}
