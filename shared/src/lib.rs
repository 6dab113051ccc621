use serde::{Deserialize, Serialize};
use std::fmt;

pub const PROTOCOL_VERSION: u32 = 1;
pub const GRID_WIDTH: i32 = 8;
pub const GRID_HEIGHT: i32 = 6;
pub const MAX_NAME_LEN: usize = 16;

/// Opaque identity handed out by the session layer.
pub type ClientId = u32;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Seat {
    A,
    B,
}

impl Seat {
    pub const ALL: [Seat; 2] = [Seat::A, Seat::B];

    pub fn other(self) -> Seat {
        match self {
            Seat::A => Seat::B,
            Seat::B => Seat::A,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Seat::A => 0,
            Seat::B => 1,
        }
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Seat::A => write!(f, "A"),
            Seat::B => write!(f, "B"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Grid delta, with y growing downwards.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Attack,
    Heal,
    Defend,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Attack => write!(f, "attack"),
            ActionKind::Heal => write!(f, "heal"),
            ActionKind::Defend => write!(f, "defend"),
        }
    }
}

/// How a client is attached to a room.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Host,
    Player,
    Spectator,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn manhattan(&self, other: &Position) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Stats a client asks for when taking a seat. The server clamps every field.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct StatsRequest {
    pub hp_max: i32,
    pub atk: i32,
    pub def: i32,
    pub heal_power: i32,
    pub power: i32,
}

impl Default for StatsRequest {
    fn default() -> Self {
        Self {
            hp_max: 100,
            atk: 20,
            def: 8,
            heal_power: 15,
            power: 5000,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    Idle,
    Running,
    Ended,
}

/// Closed catalog of timed modifiers the scheduler can hand out.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifierKind {
    PowerPenalty,
    CooldownSlow,
    Stink,
    NoDamage,
    CooldownFast,
    HalfDamage,
}

impl ModifierKind {
    pub const MALUS: [ModifierKind; 3] = [
        ModifierKind::PowerPenalty,
        ModifierKind::CooldownSlow,
        ModifierKind::Stink,
    ];
    pub const BONUS: [ModifierKind; 3] = [
        ModifierKind::NoDamage,
        ModifierKind::CooldownFast,
        ModifierKind::HalfDamage,
    ];

    pub fn is_bonus(self) -> bool {
        Self::BONUS.contains(&self)
    }
}

impl fmt::Display for ModifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ModifierKind::PowerPenalty => "power penalty",
            ModifierKind::CooldownSlow => "slow cooldowns",
            ModifierKind::Stink => "stink",
            ModifierKind::NoDamage => "no-damage chance",
            ModifierKind::CooldownFast => "fast cooldowns",
            ModifierKind::HalfDamage => "half damage taken",
        };
        write!(f, "{}", label)
    }
}

/// Side of the arena a cosmetic projectile is drawn from.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ThrowOrigin {
    North,
    South,
    East,
    West,
}

impl ThrowOrigin {
    pub const ALL: [ThrowOrigin; 4] = [
        ThrowOrigin::North,
        ThrowOrigin::South,
        ThrowOrigin::East,
        ThrowOrigin::West,
    ];
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    Knockout,
    Timeout,
}

/// One-shot events for client animation. Never part of the room state.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum Notification {
    IncomingThrow {
        target: Seat,
        modifier: ModifierKind,
        origin: ThrowOrigin,
    },
    CornerReached {
        seat: Seat,
        position: Position,
    },
    StinkCleared {
        seat: Seat,
    },
    MatchEnded {
        winner: Option<Seat>,
        reason: EndReason,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ActiveStatus {
    pub kind: ModifierKind,
    pub remaining_ms: u64,
}

/// Public per-seat fields. Carries no session identity.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PlayerView {
    pub seat: Seat,
    pub name: String,
    pub position: Position,
    pub hp: i32,
    pub hp_max: i32,
    pub atk: i32,
    pub def: i32,
    pub heal_power: i32,
    pub power: i32,
    pub effective_power: i32,
    pub shield: i32,
    pub heals_left: u32,
    pub defends_left: u32,
    pub statuses: Vec<ActiveStatus>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RoomView {
    pub code: String,
    pub phase: MatchPhase,
    pub match_remaining_ms: Option<u64>,
    pub next_modifier_ms: Option<u64>,
    pub players: Vec<PlayerView>,
    pub winner: Option<Seat>,
    pub loser: Option<Seat>,
    pub draw: bool,
    pub events: Vec<String>,
}

impl RoomView {
    pub fn player(&self, seat: Seat) -> Option<&PlayerView> {
        self.players.iter().find(|p| p.seat == seat)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Connect {
        client_version: u32,
    },
    CreateRoom {
        password: String,
    },
    JoinRoom {
        code: String,
        password: String,
        role: Role,
    },
    JoinSeat {
        seat: Seat,
        name: String,
        stats: StatsRequest,
    },
    StartMatch,
    Move {
        direction: Direction,
    },
    Action {
        kind: ActionKind,
    },
    ResetMatch,
    LeaveRoom,
    Heartbeat,
    Disconnect,

    Connected {
        client_id: ClientId,
    },
    RoomJoined {
        code: String,
        role: Role,
    },
    State(RoomView),
    Notify(Notification),
    Rejected {
        reason: String,
    },
    Disconnected {
        reason: String,
    },
}
