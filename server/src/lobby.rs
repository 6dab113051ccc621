//! Room membership and passwords
//!
//! The lobby is the session layer's book of who is attached to which room
//! and in what role. It hands out room codes, checks passwords, and tells the
//! server when a room has nobody left so the registry can drop it. Nothing in
//! here touches match state.

use crate::error::Rejection;
use log::info;
use rand::seq::SliceRandom;
use rand::Rng;
use shared::{ClientId, Role};
use std::collections::{HashMap, HashSet};

const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";
const CODE_LEN: usize = 4;

#[derive(Debug, Clone)]
struct RoomAccess {
    password: String,
    host: Option<ClientId>,
    players: HashSet<ClientId>,
    spectators: HashSet<ClientId>,
}

impl RoomAccess {
    fn is_empty(&self) -> bool {
        self.host.is_none() && self.players.is_empty() && self.spectators.is_empty()
    }

    fn remove(&mut self, client_id: ClientId, role: Role) {
        match role {
            Role::Host => {
                if self.host == Some(client_id) {
                    self.host = None;
                }
            }
            Role::Player => {
                self.players.remove(&client_id);
            }
            Role::Spectator => {
                self.spectators.remove(&client_id);
            }
        }
    }

    fn members(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.host
            .iter()
            .copied()
            .chain(self.players.iter().copied())
            .chain(self.spectators.iter().copied())
    }
}

/// Where a client ended up after leaving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub code: String,
    pub role: Role,
    pub room_empty: bool,
}

#[derive(Debug, Default)]
pub struct Lobby {
    rooms: HashMap<String, RoomAccess>,
    membership: HashMap<ClientId, (String, Role)>,
}

impl Lobby {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a room with `host` attached and returns its fresh code.
    pub fn create_room<R: Rng + ?Sized>(
        &mut self,
        host: ClientId,
        password: &str,
        rng: &mut R,
    ) -> String {
        let code = loop {
            let candidate: String = (0..CODE_LEN)
                .filter_map(|_| CODE_ALPHABET.choose(rng).map(|b| *b as char))
                .collect();
            if !self.rooms.contains_key(&candidate) {
                break candidate;
            }
        };

        self.rooms.insert(
            code.clone(),
            RoomAccess {
                password: password.to_string(),
                host: Some(host),
                players: HashSet::new(),
                spectators: HashSet::new(),
            },
        );
        self.membership.insert(host, (code.clone(), Role::Host));
        info!("Client {} opened room {}", host, code);
        code
    }

    /// Attaches `client_id` to `code` as `role`. A client already in the same
    /// room just switches role; callers detach from any other room first.
    pub fn join(
        &mut self,
        client_id: ClientId,
        code: &str,
        password: &str,
        role: Role,
    ) -> Result<(), Rejection> {
        let access = self.rooms.get_mut(code).ok_or(Rejection::UnknownRoom)?;
        if access.password != password {
            return Err(Rejection::WrongPassword);
        }
        if role == Role::Host && access.host.is_some_and(|host| host != client_id) {
            return Err(Rejection::RoomFull);
        }

        if let Some((current, previous)) = self.membership.get(&client_id) {
            if current == code {
                access.remove(client_id, *previous);
            }
        }

        match role {
            Role::Host => {
                access.host = Some(client_id);
            }
            Role::Player => {
                access.players.insert(client_id);
            }
            Role::Spectator => {
                access.spectators.insert(client_id);
            }
        }

        self.membership
            .insert(client_id, (code.to_string(), role));
        info!("Client {} joined room {} as {:?}", client_id, code, role);
        Ok(())
    }

    pub fn membership(&self, client_id: ClientId) -> Option<(&str, Role)> {
        self.membership
            .get(&client_id)
            .map(|(code, role)| (code.as_str(), *role))
    }

    pub fn host_of(&self, code: &str) -> Option<ClientId> {
        self.rooms.get(code).and_then(|access| access.host)
    }

    /// Whether `client_id` may start or reset its room's match. With a host
    /// present only the host may; otherwise any seated non-spectator.
    pub fn can_control(&self, client_id: ClientId, seated: bool) -> bool {
        let Some((code, role)) = self.membership(client_id) else {
            return false;
        };
        match self.host_of(code) {
            Some(host) => host == client_id,
            None => seated && role != Role::Spectator,
        }
    }

    pub fn members(&self, code: &str) -> Vec<ClientId> {
        self.rooms
            .get(code)
            .map(|access| access.members().collect())
            .unwrap_or_default()
    }

    pub fn leave(&mut self, client_id: ClientId) -> Option<Departure> {
        let (code, role) = self.membership.remove(&client_id)?;
        let access = self.rooms.get_mut(&code)?;
        access.remove(client_id, role);

        let room_empty = access.is_empty();
        if room_empty {
            self.rooms.remove(&code);
            info!("Room {} closed, nobody left", code);
        }

        Some(Departure {
            code,
            role,
            room_empty,
        })
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn lobby_with_room() -> (Lobby, String) {
        let mut lobby = Lobby::new();
        let mut rng = StdRng::seed_from_u64(1);
        let code = lobby.create_room(1, "hunter2", &mut rng);
        (lobby, code)
    }

    #[test]
    fn test_create_room_code_shape() {
        let (lobby, code) = lobby_with_room();
        assert_eq!(code.len(), CODE_LEN);
        assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        assert_eq!(lobby.membership(1), Some((code.as_str(), Role::Host)));
        assert_eq!(lobby.room_count(), 1);
    }

    #[test]
    fn test_join_checks_password() {
        let (mut lobby, code) = lobby_with_room();
        assert_eq!(
            lobby.join(2, &code, "wrong", Role::Player),
            Err(Rejection::WrongPassword)
        );
        assert_eq!(
            lobby.join(2, "ZZZZ", "hunter2", Role::Player),
            Err(Rejection::UnknownRoom)
        );
        assert_eq!(lobby.join(2, &code, "hunter2", Role::Player), Ok(()));
        assert_eq!(lobby.membership(2), Some((code.as_str(), Role::Player)));
    }

    #[test]
    fn test_second_host_rejected() {
        let (mut lobby, code) = lobby_with_room();
        assert_eq!(
            lobby.join(2, &code, "hunter2", Role::Host),
            Err(Rejection::RoomFull)
        );
    }

    #[test]
    fn test_spectators_cannot_control() {
        let (mut lobby, code) = lobby_with_room();
        lobby.join(3, &code, "hunter2", Role::Spectator).unwrap();
        assert!(!lobby.can_control(3, false));
        assert_eq!(lobby.members(&code).len(), 2);
    }

    #[test]
    fn test_only_host_controls_while_present() {
        let (mut lobby, code) = lobby_with_room();
        lobby.join(2, &code, "hunter2", Role::Player).unwrap();

        assert!(lobby.can_control(1, false));
        assert!(!lobby.can_control(2, true));
        assert!(!lobby.can_control(2, false));

        lobby.leave(1);
        assert_eq!(lobby.host_of(&code), None);
        assert!(lobby.can_control(2, true));
        assert!(!lobby.can_control(2, false));
    }

    #[test]
    fn test_rejoin_same_room_switches_role() {
        let (mut lobby, code) = lobby_with_room();

        assert_eq!(lobby.join(1, &code, "hunter2", Role::Player), Ok(()));
        assert_eq!(lobby.membership(1), Some((code.as_str(), Role::Player)));
        assert_eq!(lobby.host_of(&code), None);
        assert_eq!(lobby.members(&code), vec![1]);
        assert_eq!(lobby.room_count(), 1);

        let departure = lobby.leave(1).unwrap();
        assert_eq!(departure.role, Role::Player);
        assert!(departure.room_empty);
    }

    #[test]
    fn test_room_closes_when_everyone_leaves() {
        let (mut lobby, code) = lobby_with_room();
        lobby.join(2, &code, "hunter2", Role::Player).unwrap();

        let departure = lobby.leave(1).unwrap();
        assert_eq!(departure.role, Role::Host);
        assert!(!departure.room_empty);

        let departure = lobby.leave(2).unwrap();
        assert!(departure.room_empty);
        assert_eq!(lobby.room_count(), 0);
        assert!(lobby.leave(2).is_none());
    }
}
