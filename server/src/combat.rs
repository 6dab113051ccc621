//! Action resolution: attack, heal and defend
//!
//! Attacks are free-fire: there is no turn order, each identity is gated only
//! by its own per-action cooldown, and the target must be within one grid
//! step (Manhattan distance). Damage is `max(1, round(atk - def / 2))`.
//!
//! The resolver never leaves a half-applied action behind. Every check that
//! can reject runs before the first mutation.

use crate::config::ArenaConfig;
use crate::error::Rejection;
use crate::movement::cells_away_from;
use crate::player::Player;
use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;
use shared::{ActionKind, ModifierKind, Position};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Last successful use of each action by one identity.
///
/// The enforced cooldown is derived at the moment of the next attempt, so a
/// slow or fast modifier picked up in between applies immediately.
#[derive(Debug, Clone, Default)]
pub struct Cooldowns {
    last_used: HashMap<ActionKind, Instant>,
}

impl Cooldowns {
    pub fn ready_at(&self, kind: ActionKind, multiplier: f64, config: &ArenaConfig) -> Option<Instant> {
        self.last_used
            .get(&kind)
            .map(|used| *used + scaled_cooldown(kind, multiplier, config))
    }

    /// `Err(OnCooldown)` while `now` is before the not-before instant.
    pub fn check(
        &self,
        kind: ActionKind,
        now: Instant,
        multiplier: f64,
        config: &ArenaConfig,
    ) -> Result<(), Rejection> {
        match self.ready_at(kind, multiplier, config) {
            Some(ready) if now < ready => Err(Rejection::OnCooldown {
                remaining_ms: ready.duration_since(now).as_millis() as u64,
            }),
            _ => Ok(()),
        }
    }

    pub fn mark_used(&mut self, kind: ActionKind, now: Instant) {
        self.last_used.insert(kind, now);
    }
}

pub fn base_cooldown(kind: ActionKind, config: &ArenaConfig) -> Duration {
    let ms = match kind {
        ActionKind::Attack => config.attack_cooldown_ms,
        ActionKind::Heal => config.heal_cooldown_ms,
        ActionKind::Defend => config.defend_cooldown_ms,
    };
    Duration::from_millis(ms)
}

pub fn scaled_cooldown(kind: ActionKind, multiplier: f64, config: &ArenaConfig) -> Duration {
    let base_ms = base_cooldown(kind, config).as_millis() as f64;
    Duration::from_millis((base_ms * multiplier.max(0.0)).round() as u64)
}

pub fn base_damage(atk: i32, target_def: i32) -> i32 {
    let raw = (f64::from(atk) - f64::from(target_def) / 2.0).round() as i32;
    raw.max(1)
}

pub fn shield_gain(def: i32) -> i32 {
    (def + 10).clamp(5, 200)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttackReport {
    pub raw: i32,
    pub blocked: i32,
    pub nullified: bool,
    pub halved: bool,
    pub teleported_to: Option<Position>,
    pub dealt: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Attack(AttackReport),
    Heal { restored: i32 },
    Defend { added: i32 },
}

/// Validation that does not depend on cooldowns.
pub fn precheck(kind: ActionKind, actor: &Player, target: &Player) -> Result<(), Rejection> {
    match kind {
        ActionKind::Attack if actor.position.manhattan(&target.position) > 1 => {
            Err(Rejection::OutOfRange)
        }
        ActionKind::Heal if actor.heals_left == 0 => Err(Rejection::OutOfUses),
        ActionKind::Defend if actor.defends_left == 0 => Err(Rejection::OutOfUses),
        _ => Ok(()),
    }
}

/// Applies an already validated action. `log` receives the human readable
/// event lines for the room's event log.
pub fn apply<R: Rng + ?Sized>(
    kind: ActionKind,
    actor: &mut Player,
    target: &mut Player,
    now: Instant,
    rng: &mut R,
    config: &ArenaConfig,
    log: &mut dyn FnMut(String),
) -> ActionOutcome {
    match kind {
        ActionKind::Attack => ActionOutcome::Attack(attack(actor, target, now, rng, config, log)),
        ActionKind::Heal => {
            actor.heals_left -= 1;
            let restored = actor.heal(actor.heal_power);
            if restored == 0 {
                log(format!("{} heals but nothing changes", actor.name));
            } else {
                log(format!("{} heals {} hp", actor.name, restored));
            }
            ActionOutcome::Heal { restored }
        }
        ActionKind::Defend => {
            actor.defends_left -= 1;
            let added = shield_gain(actor.def);
            actor.add_shield(added);
            log(format!(
                "{} raises a shield (+{}, now {})",
                actor.name, added, actor.shield
            ));
            ActionOutcome::Defend { added }
        }
    }
}

fn attack<R: Rng + ?Sized>(
    attacker: &mut Player,
    defender: &mut Player,
    now: Instant,
    rng: &mut R,
    config: &ArenaConfig,
    log: &mut dyn FnMut(String),
) -> AttackReport {
    let raw = base_damage(attacker.atk, defender.def);
    let mut report = AttackReport {
        raw,
        blocked: 0,
        nullified: false,
        halved: false,
        teleported_to: None,
        dealt: 0,
    };

    let (blocked, mut damage) = defender.absorb(raw);
    report.blocked = blocked;
    if blocked > 0 {
        log(format!(
            "{}'s shield absorbs {} damage",
            defender.name, blocked
        ));
    }

    if damage > 0
        && attacker.status.is_active(ModifierKind::NoDamage, now)
        && rng.gen_bool(config.no_damage_chance.clamp(0.0, 1.0))
    {
        damage = 0;
        report.nullified = true;
        log(format!("{}'s hit fizzles", attacker.name));
    }

    if damage > 0 && defender.status.is_active(ModifierKind::HalfDamage, now) {
        damage = (f64::from(damage) / 2.0).round() as i32;
        report.halved = true;

        if rng.gen_bool(config.teleport_chance.clamp(0.0, 1.0)) {
            let cells = cells_away_from(attacker.position, config);
            if let Some(cell) = cells.choose(rng) {
                defender.position = *cell;
                report.teleported_to = Some(*cell);
                log(format!("{} blinks away to {}", defender.name, cell));
            }
        }
    }

    report.dealt = defender.take_damage(damage);
    log(format!(
        "{} hits {} for {} ({} hp left)",
        attacker.name, defender.name, report.dealt, defender.hp
    ));
    debug!(
        "attack {} -> {}: raw={} blocked={} dealt={}",
        attacker.seat, defender.seat, raw, blocked, report.dealt
    );

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use shared::{Seat, StatsRequest};

    fn pair(config: &ArenaConfig) -> (Player, Player) {
        let mut a = Player::new(1, Seat::A, "A", &StatsRequest::default(), config);
        let mut b = Player::new(2, Seat::B, "B", &StatsRequest::default(), config);
        a.position = Position::new(2, 2);
        b.position = Position::new(3, 2);
        (a, b)
    }

    fn run(
        kind: ActionKind,
        actor: &mut Player,
        target: &mut Player,
        now: Instant,
        config: &ArenaConfig,
    ) -> (ActionOutcome, Vec<String>) {
        let mut rng = StdRng::seed_from_u64(7);
        let mut lines = Vec::new();
        let outcome = apply(kind, actor, target, now, &mut rng, config, &mut |line: String| {
            lines.push(line)
        });
        (outcome, lines)
    }

    #[test]
    fn test_base_damage_formula() {
        assert_eq!(base_damage(20, 8), 16);
        assert_eq!(base_damage(1, 40), 1);
        assert_eq!(base_damage(10, 5), 8);
        assert_eq!(base_damage(10, 3), 9);
    }

    #[test]
    fn test_attack_without_modifiers() {
        let config = ArenaConfig::default();
        let (mut a, mut b) = pair(&config);
        a.atk = 20;
        b.def = 8;

        let (outcome, _) = run(ActionKind::Attack, &mut a, &mut b, Instant::now(), &config);

        match outcome {
            ActionOutcome::Attack(report) => {
                assert_eq!(report.raw, 16);
                assert_eq!(report.blocked, 0);
                assert_eq!(report.dealt, 16);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(b.hp, 84);
    }

    #[test]
    fn test_shield_absorbs_first() {
        let config = ArenaConfig::default();
        let (mut a, mut b) = pair(&config);
        a.atk = 20;
        b.def = 8;
        b.shield = 10;

        let (outcome, lines) = run(ActionKind::Attack, &mut a, &mut b, Instant::now(), &config);

        match outcome {
            ActionOutcome::Attack(report) => {
                assert_eq!(report.blocked, 10);
                assert_eq!(report.dealt, 6);
                assert!(report.blocked <= report.raw);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(b.shield, 0);
        assert_eq!(b.hp, 94);
        assert!(lines.iter().any(|l| l.contains("absorbs 10")));
    }

    #[test]
    fn test_no_damage_bonus_can_nullify() {
        let config = ArenaConfig {
            no_damage_chance: 1.0,
            ..ArenaConfig::default()
        };
        let now = Instant::now();
        let (mut a, mut b) = pair(&config);
        a.status
            .apply(ModifierKind::NoDamage, now + Duration::from_secs(1));

        let (outcome, _) = run(ActionKind::Attack, &mut a, &mut b, now, &config);

        match outcome {
            ActionOutcome::Attack(report) => {
                assert!(report.nullified);
                assert_eq!(report.dealt, 0);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(b.hp, b.hp_max);
    }

    #[test]
    fn test_half_damage_and_teleport() {
        let config = ArenaConfig {
            teleport_chance: 1.0,
            ..ArenaConfig::default()
        };
        let now = Instant::now();
        let (mut a, mut b) = pair(&config);
        a.atk = 20;
        b.def = 8;
        b.status
            .apply(ModifierKind::HalfDamage, now + Duration::from_secs(1));

        let (outcome, _) = run(ActionKind::Attack, &mut a, &mut b, now, &config);

        match outcome {
            ActionOutcome::Attack(report) => {
                assert!(report.halved);
                assert_eq!(report.dealt, 8);
                let landed = report.teleported_to.expect("teleport should fire");
                assert_eq!(landed, b.position);
                assert!(landed.manhattan(&a.position) > 1);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_half_damage_without_teleport() {
        let config = ArenaConfig {
            teleport_chance: 0.0,
            ..ArenaConfig::default()
        };
        let now = Instant::now();
        let (mut a, mut b) = pair(&config);
        let before = b.position;
        b.status
            .apply(ModifierKind::HalfDamage, now + Duration::from_secs(1));

        let (outcome, _) = run(ActionKind::Attack, &mut a, &mut b, now, &config);

        match outcome {
            ActionOutcome::Attack(report) => assert_eq!(report.teleported_to, None),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(b.position, before);
    }

    #[test]
    fn test_lethal_hit_floors_at_zero() {
        let config = ArenaConfig::default();
        let (mut a, mut b) = pair(&config);
        a.atk = 60;
        b.def = 0;
        b.set_hp(5);

        run(ActionKind::Attack, &mut a, &mut b, Instant::now(), &config);

        assert_eq!(b.hp, 0);
    }

    #[test]
    fn test_heal_clamps_and_consumes_use() {
        let config = ArenaConfig::default();
        let (mut a, mut b) = pair(&config);
        a.set_hp(90);

        let (outcome, _) = run(ActionKind::Heal, &mut a, &mut b, Instant::now(), &config);

        assert_eq!(outcome, ActionOutcome::Heal { restored: 10 });
        assert_eq!(a.hp, a.hp_max);
        assert_eq!(a.heals_left, config.max_heals - 1);
    }

    #[test]
    fn test_zero_heal_power_logs_noop() {
        let config = ArenaConfig::default();
        let (mut a, mut b) = pair(&config);
        a.heal_power = 0;
        a.set_hp(50);

        let (outcome, lines) = run(ActionKind::Heal, &mut a, &mut b, Instant::now(), &config);

        assert_eq!(outcome, ActionOutcome::Heal { restored: 0 });
        assert_eq!(a.hp, 50);
        assert!(lines[0].contains("nothing changes"));
    }

    #[test]
    fn test_defend_stacks_shield() {
        let config = ArenaConfig::default();
        let (mut a, mut b) = pair(&config);
        a.def = 8;

        run(ActionKind::Defend, &mut a, &mut b, Instant::now(), &config);
        run(ActionKind::Defend, &mut a, &mut b, Instant::now(), &config);

        assert_eq!(a.shield, 36);
        assert_eq!(a.defends_left, config.max_defends - 2);
        assert_eq!(shield_gain(-100), 5);
        assert_eq!(shield_gain(500), 200);
    }

    #[test]
    fn test_precheck_rejections() {
        let config = ArenaConfig::default();
        let (mut a, mut b) = pair(&config);

        assert_eq!(precheck(ActionKind::Attack, &a, &b), Ok(()));
        b.position = Position::new(5, 5);
        assert_eq!(precheck(ActionKind::Attack, &a, &b), Err(Rejection::OutOfRange));

        a.heals_left = 0;
        a.defends_left = 0;
        assert_eq!(precheck(ActionKind::Heal, &a, &b), Err(Rejection::OutOfUses));
        assert_eq!(precheck(ActionKind::Defend, &a, &b), Err(Rejection::OutOfUses));
    }

    #[test]
    fn test_cooldown_gate_uses_current_multiplier() {
        let config = ArenaConfig::default();
        let now = Instant::now();
        let mut cooldowns = Cooldowns::default();

        assert_eq!(cooldowns.check(ActionKind::Attack, now, 1.0, &config), Ok(()));
        cooldowns.mark_used(ActionKind::Attack, now);

        let later = now + Duration::from_millis(700);
        assert_eq!(cooldowns.check(ActionKind::Attack, later, 1.0, &config), Ok(()));
        assert_eq!(
            cooldowns.check(ActionKind::Attack, later, 1.5, &config),
            Err(Rejection::OnCooldown { remaining_ms: 350 })
        );
        assert_eq!(
            cooldowns.check(ActionKind::Attack, now + Duration::from_millis(420), 0.6, &config),
            Ok(())
        );
        assert_eq!(cooldowns.check(ActionKind::Heal, now, 1.0, &config), Ok(()));
    }
}
