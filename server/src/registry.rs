//! Room registry
//!
//! Owns every live [`Room`], the random source used by the resolver and the
//! modifier scheduler, and the queue of deferred stink clears. All mutation
//! goes through `&mut self`, so the single server loop that owns the registry
//! is the only writer and events are applied strictly in arrival order.

use crate::config::ArenaConfig;
use crate::error::Rejection;
use crate::modifiers::DeferredClear;
use crate::room::Room;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{
    ActionKind, ClientId, Direction, MatchPhase, Notification, RoomView, Seat, StatsRequest,
};
use std::collections::BTreeMap;
use std::time::Instant;

/// Result of a successful mutation: the fresh projection plus one-shot
/// notifications for everyone in the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub view: RoomView,
    pub notifications: Vec<Notification>,
}

pub struct RoomRegistry {
    rooms: BTreeMap<String, Room>,
    config: ArenaConfig,
    rng: StdRng,
    pending_clears: Vec<DeferredClear>,
}

impl RoomRegistry {
    pub fn new(config: ArenaConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Deterministic registry for replays and tests.
    pub fn with_seed(config: ArenaConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: ArenaConfig, rng: StdRng) -> Self {
        Self {
            rooms: BTreeMap::new(),
            config,
            rng,
            pending_clears: Vec::new(),
        }
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    pub fn create_room(&mut self, code: &str) -> bool {
        if self.rooms.contains_key(code) {
            return false;
        }
        self.rooms
            .insert(code.to_string(), Room::new(code, &self.config));
        info!("Created room {}", code);
        true
    }

    pub fn remove_room(&mut self, code: &str) -> bool {
        self.pending_clears.retain(|clear| clear.code != code);
        let removed = self.rooms.remove(code).is_some();
        if removed {
            info!("Removed room {}", code);
        }
        removed
    }

    pub fn room(&self, code: &str) -> Option<&Room> {
        self.rooms.get(code)
    }

    pub fn room_mut(&mut self, code: &str) -> Option<&mut Room> {
        self.rooms.get_mut(code)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn pending_clears(&self) -> usize {
        self.pending_clears.len()
    }

    pub fn view(&self, code: &str, now: Instant) -> Option<RoomView> {
        self.rooms.get(code).map(|room| room.view(now, &self.config))
    }

    fn update(&self, code: &str, now: Instant, notifications: Vec<Notification>) -> Result<Update, Rejection> {
        let view = self.view(code, now).ok_or(Rejection::UnknownRoom)?;
        Ok(Update {
            view,
            notifications,
        })
    }

    pub fn join_seat(
        &mut self,
        code: &str,
        caller: ClientId,
        seat: Seat,
        name: &str,
        stats: &StatsRequest,
        now: Instant,
    ) -> Result<Update, Rejection> {
        let room = self.rooms.get_mut(code).ok_or(Rejection::UnknownRoom)?;
        room.join_seat(caller, seat, name, stats, &self.config)?;
        self.update(code, now, Vec::new())
    }

    /// The session layer decides who may start a match; the room checks that
    /// it can start.
    pub fn start_match(&mut self, code: &str, caller: ClientId, now: Instant) -> Result<Update, Rejection> {
        let room = self.rooms.get_mut(code).ok_or(Rejection::UnknownRoom)?;
        room.start(now, &self.config)?;
        info!("Client {} started the match in room {}", caller, code);
        self.update(code, now, Vec::new())
    }

    pub fn reset_match(&mut self, code: &str, caller: ClientId, now: Instant) -> Result<Update, Rejection> {
        let room = self.rooms.get_mut(code).ok_or(Rejection::UnknownRoom)?;
        room.reset();
        info!("Client {} reset room {}", caller, code);
        self.update(code, now, Vec::new())
    }

    pub fn move_player(
        &mut self,
        code: &str,
        caller: ClientId,
        direction: Direction,
        now: Instant,
    ) -> Result<Update, Rejection> {
        let room = self.rooms.get_mut(code).ok_or(Rejection::UnknownRoom)?;
        let notifications = room.move_player(caller, direction, &self.config)?;
        self.update(code, now, notifications)
    }

    pub fn act(
        &mut self,
        code: &str,
        caller: ClientId,
        kind: ActionKind,
        now: Instant,
    ) -> Result<Update, Rejection> {
        let room = self.rooms.get_mut(code).ok_or(Rejection::UnknownRoom)?;
        let (_, notifications) = room.act(caller, kind, now, &mut self.rng, &self.config)?;
        self.update(code, now, notifications)
    }

    /// Drops the caller's seat, if any. Leaving as a spectator is not an error.
    pub fn leave(&mut self, code: &str, caller: ClientId, now: Instant) -> Result<Update, Rejection> {
        let room = self.rooms.get_mut(code).ok_or(Rejection::UnknownRoom)?;
        room.leave(caller);
        self.update(code, now, Vec::new())
    }

    /// One scheduler pass over every room.
    ///
    /// Runs due stink clears first, then match timeouts and modifiers.
    /// Returns an update for every room that is running or produced a
    /// notification.
    pub fn tick(&mut self, now: Instant) -> Vec<(String, Update)> {
        let mut touched: BTreeMap<String, Vec<Notification>> = BTreeMap::new();

        let (due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending_clears)
            .into_iter()
            .partition(|clear| clear.due <= now);
        self.pending_clears = pending;

        for clear in due {
            let Some(room) = self.rooms.get_mut(&clear.code) else {
                continue;
            };
            if room.clear_stink(clear.seat, clear.generation, now) {
                touched
                    .entry(clear.code.clone())
                    .or_default()
                    .push(Notification::StinkCleared { seat: clear.seat });
            }
        }

        for (code, room) in self.rooms.iter_mut() {
            let was_running = room.phase == MatchPhase::Running;
            let tick = room.tick(now, &mut self.rng, &self.config);

            if let Some(clear) = tick.deferred {
                self.pending_clears.push(clear);
            }
            if was_running || !tick.notifications.is_empty() {
                touched
                    .entry(code.clone())
                    .or_default()
                    .extend(tick.notifications);
            }
        }

        touched
            .into_iter()
            .filter_map(|(code, notifications)| {
                let view = self.view(&code, now)?;
                Some((
                    code,
                    Update {
                        view,
                        notifications,
                    },
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{EndReason, ModifierKind};
    use std::time::Duration;

    fn registry_with_match(now: Instant) -> RoomRegistry {
        let mut registry = RoomRegistry::with_seed(ArenaConfig::default(), 11);
        registry.create_room("ARENA");
        registry
            .join_seat("ARENA", 1, Seat::A, "Ada", &StatsRequest::default(), now)
            .unwrap();
        registry
            .join_seat("ARENA", 2, Seat::B, "Bo", &StatsRequest::default(), now)
            .unwrap();
        registry.start_match("ARENA", 1, now).unwrap();
        registry
    }

    #[test]
    fn test_unknown_room() {
        let mut registry = RoomRegistry::with_seed(ArenaConfig::default(), 0);
        let result = registry.act("NOPE", 1, ActionKind::Attack, Instant::now());
        assert_eq!(result, Err(Rejection::UnknownRoom));
    }

    #[test]
    fn test_create_room_is_idempotent() {
        let mut registry = RoomRegistry::with_seed(ArenaConfig::default(), 0);
        assert!(registry.create_room("ABCD"));
        assert!(!registry.create_room("ABCD"));
        assert_eq!(registry.len(), 1);
        assert!(registry.remove_room("ABCD"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_start_returns_running_view() {
        let now = Instant::now();
        let registry = registry_with_match(now);
        let view = registry.view("ARENA", now).unwrap();
        assert_eq!(view.phase, MatchPhase::Running);
        assert_eq!(view.players.len(), 2);
    }

    #[test]
    fn test_tick_applies_modifier_on_interval() {
        let now = Instant::now();
        let mut registry = registry_with_match(now);
        let interval = registry.config().modifier_interval();

        let quiet = registry.tick(now + Duration::from_secs(1));
        assert_eq!(quiet.len(), 1);
        assert!(quiet[0].1.notifications.is_empty());

        let updates = registry.tick(now + interval);
        assert_eq!(updates.len(), 1);
        assert!(updates[0]
            .1
            .notifications
            .iter()
            .any(|n| matches!(n, Notification::IncomingThrow { .. })));
    }

    #[test]
    fn test_tick_ends_match_on_timeout() {
        let now = Instant::now();
        let mut registry = registry_with_match(now);
        registry
            .room_mut("ARENA")
            .unwrap()
            .player_mut(Seat::B)
            .unwrap()
            .set_hp(10);

        let end = now + registry.config().match_duration();
        let updates = registry.tick(end);

        let (_, update) = &updates[0];
        assert_eq!(update.view.phase, MatchPhase::Ended);
        assert_eq!(update.view.winner, Some(Seat::A));
        assert!(update.notifications.contains(&Notification::MatchEnded {
            winner: Some(Seat::A),
            reason: EndReason::Timeout
        }));

        assert!(registry.tick(end + Duration::from_secs(1)).is_empty());
    }

    #[test]
    fn test_stink_clear_fires_at_expiry() {
        let now = Instant::now();
        let mut registry = registry_with_match(now);
        let interval = registry.config().modifier_interval();

        // Run the scheduler until a stink lands.
        let mut at = now;
        let mut stinky = None;
        for _ in 0..50 {
            at += interval;
            for (_, update) in registry.tick(at) {
                for n in update.notifications {
                    if let Notification::IncomingThrow {
                        target,
                        modifier: ModifierKind::Stink,
                        ..
                    } = n
                    {
                        stinky = Some(target);
                    }
                }
            }
            if stinky.is_some() {
                break;
            }
            // Keep the match alive while we wait.
            let room = registry.room_mut("ARENA").unwrap();
            room.match_ends_at = Some(at + interval * 10);
        }
        let seat = stinky.expect("scheduler should eventually hand out a stink");
        assert_eq!(registry.pending_clears(), 1);

        // Push the next modifier out so it cannot overwrite the stink.
        let room = registry.room_mut("ARENA").unwrap();
        room.next_modifier_at = Some(at + interval * 5);
        room.match_ends_at = Some(at + interval * 10);

        let updates = registry.tick(at + interval);
        let (_, update) = &updates[0];
        assert!(update
            .notifications
            .contains(&Notification::StinkCleared { seat }));
        assert_eq!(registry.pending_clears(), 0);
        let player = registry.room("ARENA").unwrap().player(seat).unwrap();
        assert_eq!(player.status.expiry(ModifierKind::Stink), None);
    }

    #[test]
    fn test_stale_stink_clear_is_ignored_after_reset() {
        let now = Instant::now();
        let mut registry = registry_with_match(now);
        let generation = registry.room("ARENA").unwrap().generation;
        let due = now + Duration::from_secs(1);
        registry.pending_clears.push(DeferredClear {
            code: "ARENA".to_string(),
            seat: Seat::A,
            generation,
            due,
        });
        {
            let room = registry.room_mut("ARENA").unwrap();
            room.player_mut(Seat::A)
                .unwrap()
                .status
                .apply(ModifierKind::Stink, due);
        }

        registry.reset_match("ARENA", 1, now).unwrap();
        registry.start_match("ARENA", 1, now).unwrap();
        registry
            .room_mut("ARENA")
            .unwrap()
            .player_mut(Seat::A)
            .unwrap()
            .status
            .apply(ModifierKind::Stink, due);

        let updates = registry.tick(due);
        assert!(!updates[0]
            .1
            .notifications
            .contains(&Notification::StinkCleared { seat: Seat::A }));
        assert_eq!(registry.pending_clears(), 0);
    }

    #[test]
    fn test_leave_resets_running_match() {
        let now = Instant::now();
        let mut registry = registry_with_match(now);
        let update = registry.leave("ARENA", 2, now).unwrap();
        assert_eq!(update.view.phase, MatchPhase::Idle);
        assert!(update.view.player(Seat::B).is_none());
    }
}
