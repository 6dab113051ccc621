//! Per-room match controller
//!
//! A room holds two seats and walks a single match through
//! `Idle -> Running -> Ended`. All timers are instants compared against the
//! `now` handed in by the caller, so a room never schedules anything on its
//! own and can be driven deterministically from tests.
//!
//! Policies worth knowing:
//! - Both seats reaching 0 hp from one action is a draw, with no winner.
//! - On timeout the higher hp wins, then the higher effective power, and if
//!   both are equal seat A wins.
//! - A match that ends with stink still on a seat clears it on the spot.

use crate::combat::{self, ActionOutcome, Cooldowns};
use crate::config::ArenaConfig;
use crate::error::Rejection;
use crate::modifiers::{self, DeferredClear};
use crate::movement::{self, StepOutcome};
use crate::player::Player;
use log::{debug, info};
use rand::Rng;
use shared::{
    ActionKind, ClientId, Direction, EndReason, MatchPhase, ModifierKind, Notification, RoomView,
    Seat, StatsRequest,
};
use std::collections::{HashMap, VecDeque};
use std::time::Instant;

/// Ring of recent human readable events. Oldest entries fall off first.
#[derive(Debug, Clone)]
pub struct EventLog {
    entries: VecDeque<String>,
    capacity: usize,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, line: String) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(line);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }
}

/// What a periodic tick did to a room.
#[derive(Debug, Default)]
pub struct RoomTick {
    pub notifications: Vec<Notification>,
    pub deferred: Option<DeferredClear>,
}

#[derive(Debug, Clone)]
pub struct Room {
    pub code: String,
    pub phase: MatchPhase,
    pub started: bool,
    pub match_ends_at: Option<Instant>,
    pub next_modifier_at: Option<Instant>,
    pub winner: Option<Seat>,
    pub loser: Option<Seat>,
    pub draw: bool,
    /// Bumped whenever a match starts, ends or is reset.
    pub generation: u64,
    seats: [Option<Player>; 2],
    events: EventLog,
    cooldowns: HashMap<ClientId, Cooldowns>,
}

impl Room {
    pub fn new(code: &str, config: &ArenaConfig) -> Self {
        Self {
            code: code.to_string(),
            phase: MatchPhase::Idle,
            started: false,
            match_ends_at: None,
            next_modifier_at: None,
            winner: None,
            loser: None,
            draw: false,
            generation: 0,
            seats: [None, None],
            events: EventLog::new(config.event_log_capacity),
            cooldowns: HashMap::new(),
        }
    }

    pub fn player(&self, seat: Seat) -> Option<&Player> {
        self.seats[seat.index()].as_ref()
    }

    pub fn player_mut(&mut self, seat: Seat) -> Option<&mut Player> {
        self.seats[seat.index()].as_mut()
    }

    pub fn seat_of(&self, client_id: ClientId) -> Option<Seat> {
        Seat::ALL
            .into_iter()
            .find(|seat| self.player(*seat).is_some_and(|p| p.client_id == client_id))
    }

    pub fn is_full(&self) -> bool {
        self.seats.iter().all(Option::is_some)
    }

    pub fn log(&mut self, line: String) {
        debug!("room {}: {}", self.code, line);
        self.events.push(line);
    }

    /// Binds `client_id` to `seat`. A client already holding the other seat
    /// moves over; taking the same seat again replaces the player.
    pub fn join_seat(
        &mut self,
        client_id: ClientId,
        seat: Seat,
        name: &str,
        stats: &StatsRequest,
        config: &ArenaConfig,
    ) -> Result<(), Rejection> {
        if let Some(holder) = self.player(seat) {
            if holder.client_id != client_id {
                return Err(Rejection::SeatTaken);
            }
        }
        if self.started {
            return Err(Rejection::NotAuthorized);
        }

        if let Some(previous) = self.seat_of(client_id) {
            self.seats[previous.index()] = None;
        }

        let player = Player::new(client_id, seat, name, stats, config);
        self.log(format!("{} takes seat {}", player.name, seat));
        self.seats[seat.index()] = Some(player);
        Ok(())
    }

    /// Vacates the caller's seat. A running match falls back to idle.
    pub fn leave(&mut self, client_id: ClientId) -> bool {
        let Some(seat) = self.seat_of(client_id) else {
            return false;
        };

        if let Some(player) = self.seats[seat.index()].take() {
            self.log(format!("{} leaves seat {}", player.name, seat));
        }
        self.cooldowns.remove(&client_id);

        if self.started {
            self.reset();
        }
        true
    }

    pub fn start(&mut self, now: Instant, config: &ArenaConfig) -> Result<(), Rejection> {
        if self.phase == MatchPhase::Running || !self.is_full() {
            return Err(Rejection::NotReady);
        }

        for player in self.seats.iter_mut().flatten() {
            player.reset_for_match(config);
        }
        self.cooldowns.clear();
        self.phase = MatchPhase::Running;
        self.started = true;
        self.match_ends_at = Some(now + config.match_duration());
        self.next_modifier_at = Some(now + config.modifier_interval());
        self.winner = None;
        self.loser = None;
        self.draw = false;
        self.generation += 1;

        info!("Room {} started match #{}", self.code, self.generation);
        self.log("Match started".to_string());
        Ok(())
    }

    /// Forces the room back to idle and invalidates pending deferred work.
    pub fn reset(&mut self) {
        self.phase = MatchPhase::Idle;
        self.started = false;
        self.match_ends_at = None;
        self.next_modifier_at = None;
        self.winner = None;
        self.loser = None;
        self.draw = false;
        self.cooldowns.clear();
        for player in self.seats.iter_mut().flatten() {
            player.shield = 0;
            player.status.clear_all();
        }
        self.generation += 1;

        info!("Room {} reset", self.code);
        self.log("Match reset".to_string());
    }

    /// Ends the match. Lingering stink is cleared here since bumping the
    /// generation voids its deferred clear.
    fn end_match(&mut self, winner: Option<Seat>, reason: EndReason) -> Vec<Notification> {
        let mut notifications = Vec::new();
        for player in self.seats.iter_mut().flatten() {
            if player.status.expiry(ModifierKind::Stink).is_some() {
                player.status.clear(ModifierKind::Stink);
                notifications.push(Notification::StinkCleared { seat: player.seat });
            }
        }

        self.phase = MatchPhase::Ended;
        self.started = false;
        self.match_ends_at = None;
        self.next_modifier_at = None;
        self.winner = winner;
        self.loser = winner.map(Seat::other);
        self.draw = winner.is_none();
        self.generation += 1;

        match winner {
            Some(seat) => {
                let name = self
                    .player(seat)
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| format!("Player {}", seat));
                self.log(format!("{} wins ({:?})", name, reason));
            }
            None => self.log("Draw".to_string()),
        }
        info!(
            "Room {} match ended: winner={:?} reason={:?}",
            self.code, winner, reason
        );

        notifications.push(Notification::MatchEnded { winner, reason });
        notifications
    }

    pub fn move_player(
        &mut self,
        client_id: ClientId,
        direction: Direction,
        config: &ArenaConfig,
    ) -> Result<Vec<Notification>, Rejection> {
        if self.phase != MatchPhase::Running {
            return Err(Rejection::NotReady);
        }
        let seat = self.seat_of(client_id).ok_or(Rejection::NotAuthorized)?;
        let occupied = self.player(seat.other()).map(|p| p.position);
        let Some(player) = self.player_mut(seat) else {
            return Err(Rejection::NotAuthorized);
        };

        match movement::step(player.position, direction, occupied, config) {
            StepOutcome::Moved { to, corner } => {
                player.position = to;
                if corner {
                    Ok(vec![Notification::CornerReached { seat, position: to }])
                } else {
                    Ok(Vec::new())
                }
            }
            StepOutcome::Blocked => Ok(Vec::new()),
        }
    }

    /// Resolves one action by the identity bound to a seat.
    pub fn act<R: Rng + ?Sized>(
        &mut self,
        client_id: ClientId,
        kind: ActionKind,
        now: Instant,
        rng: &mut R,
        config: &ArenaConfig,
    ) -> Result<(ActionOutcome, Vec<Notification>), Rejection> {
        if self.phase != MatchPhase::Running {
            return Err(Rejection::NotReady);
        }
        let seat = self.seat_of(client_id).ok_or(Rejection::NotAuthorized)?;

        let (actor, target) = seat_pair_mut(&mut self.seats, seat).ok_or(Rejection::NotReady)?;
        combat::precheck(kind, actor, target)?;

        let multiplier = actor.status.cooldown_multiplier(now, config);
        let cooldowns = self.cooldowns.entry(client_id).or_default();
        cooldowns.check(kind, now, multiplier, config)?;

        let mut lines = Vec::new();
        let outcome = combat::apply(kind, actor, target, now, rng, config, &mut |line: String| {
            lines.push(line)
        });
        cooldowns.mark_used(kind, now);

        for line in lines {
            self.log(line);
        }

        let notifications = self.check_knockout();
        Ok((outcome, notifications))
    }

    /// Ends the match if any seat is at 0 hp. Both down is a draw.
    pub fn check_knockout(&mut self) -> Vec<Notification> {
        if self.phase != MatchPhase::Running {
            return Vec::new();
        }
        let down = |seat: Seat| self.player(seat).is_some_and(Player::is_down);

        match (down(Seat::A), down(Seat::B)) {
            (false, false) => Vec::new(),
            (true, true) => self.end_match(None, EndReason::Knockout),
            (true, false) => self.end_match(Some(Seat::B), EndReason::Knockout),
            (false, true) => self.end_match(Some(Seat::A), EndReason::Knockout),
        }
    }

    /// Winner at timeout: hp, then effective power, then seat A.
    pub fn timeout_winner(&self, now: Instant, config: &ArenaConfig) -> Seat {
        let (Some(a), Some(b)) = (self.player(Seat::A), self.player(Seat::B)) else {
            return if self.player(Seat::B).is_some() {
                Seat::B
            } else {
                Seat::A
            };
        };

        if a.hp != b.hp {
            return if a.hp > b.hp { Seat::A } else { Seat::B };
        }

        let power_a = a.effective_power(now, config);
        let power_b = b.effective_power(now, config);
        if power_b > power_a {
            Seat::B
        } else {
            Seat::A
        }
    }

    pub fn tick<R: Rng + ?Sized>(
        &mut self,
        now: Instant,
        rng: &mut R,
        config: &ArenaConfig,
    ) -> RoomTick {
        let mut tick = RoomTick::default();
        if self.phase != MatchPhase::Running {
            return tick;
        }

        if self.match_ends_at.is_some_and(|ends| now >= ends) {
            let winner = self.timeout_winner(now, config);
            tick.notifications = self.end_match(Some(winner), EndReason::Timeout);
            return tick;
        }

        if let Some(applied) = modifiers::apply_due(self, now, rng, config) {
            tick.notifications.push(applied.notification);
            tick.deferred = applied.deferred;
        }
        tick
    }

    /// Runs a deferred stink clear. Stale tasks from an older match, a
    /// vacated seat, or a stink that was re-applied since do nothing.
    pub fn clear_stink(&mut self, seat: Seat, generation: u64, now: Instant) -> bool {
        if generation != self.generation {
            return false;
        }
        let Some(player) = self.player_mut(seat) else {
            return false;
        };
        match player.status.expiry(ModifierKind::Stink) {
            Some(until) if until <= now => {
                player.status.clear(ModifierKind::Stink);
                true
            }
            _ => false,
        }
    }

    pub fn view(&self, now: Instant, config: &ArenaConfig) -> RoomView {
        let remaining = |at: Option<Instant>| {
            at.map(|at| at.saturating_duration_since(now).as_millis() as u64)
        };

        RoomView {
            code: self.code.clone(),
            phase: self.phase,
            match_remaining_ms: remaining(self.match_ends_at),
            next_modifier_ms: remaining(self.next_modifier_at),
            players: self
                .seats
                .iter()
                .flatten()
                .map(|p| p.view(now, config))
                .collect(),
            winner: self.winner,
            loser: self.loser,
            draw: self.draw,
            events: self.events.to_vec(),
        }
    }
}

fn seat_pair_mut(
    seats: &mut [Option<Player>; 2],
    seat: Seat,
) -> Option<(&mut Player, &mut Player)> {
    let (first, second) = seats.split_at_mut(1);
    let (a, b) = (first[0].as_mut()?, second[0].as_mut()?);
    match seat {
        Seat::A => Some((a, b)),
        Seat::B => Some((b, a)),
    }
}
