//! # Arena Server Library
//!
//! This library provides the authoritative server for a two-seat grid arena.
//! Clients send intents (move, attack, heal, defend) and the server decides
//! every outcome, then broadcasts the resulting room projection to everyone
//! attached to the room.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Resolution
//! Movement, damage, shields, healing and cooldowns are resolved here. A
//! client never reports an outcome; it only asks for one and conforms to the
//! projection it receives back.
//!
//! ### Modifier Scheduling
//! While a match runs, a fixed interval throws one random modifier at one
//! seat. Maluses (power penalty, slowed cooldowns, stink) and bonuses (no
//! damage, fast cooldowns, half damage) each last for one interval and never
//! stack.
//!
//! ### Match Lifecycle
//! Rooms move through `Idle -> Running -> Ended`. A match ends on knockout or
//! when the match clock runs out, in which case the healthier seat wins.
//!
//! ## Architecture Design
//!
//! ### Explicit Time
//! Every core operation takes the current `Instant` as an argument. The
//! network loop reads the clock once per packet or tick and passes it down,
//! which keeps rooms and the scheduler deterministic under test.
//!
//! ### Single Owner Event Loop
//! The registry and lobby are owned by one task. Receiving, sending and
//! timeout checks run on helper tasks that talk to it over channels, so room
//! state is never shared across tasks.
//!
//! ### UDP-Based Communication
//! Packets are bincode-encoded [`shared::Packet`] values over UDP. Every
//! state change re-sends the full room projection, so a dropped datagram is
//! repaired by the next one.
//!
//! ## Module Map
//! - [`player`], [`status`]: per-seat state and timed modifiers
//! - [`movement`], [`combat`]: grid steps and the action resolver
//! - [`modifiers`]: the interval modifier scheduler
//! - [`room`], [`registry`]: match controller and the table of rooms
//! - [`lobby`], [`client_manager`], [`network`]: sessions and transport
//! - [`config`], [`error`]: tunables and rejection reasons

pub mod client_manager;
pub mod combat;
pub mod config;
pub mod error;
pub mod lobby;
pub mod modifiers;
pub mod movement;
pub mod network;
pub mod player;
pub mod registry;
pub mod room;
pub mod status;
