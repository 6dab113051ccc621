//! Rejections returned to the calling identity
//!
//! None of these are fatal. A rejected request leaves the room untouched and
//! is reported only to the client that sent it. Out-of-range stat requests
//! never show up here: they are clamped on the way in.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("not allowed to do that from this seat")]
    NotAuthorized,
    #[error("match is not running")]
    NotReady,
    #[error("on cooldown for another {remaining_ms}ms")]
    OnCooldown { remaining_ms: u64 },
    #[error("no uses left")]
    OutOfUses,
    #[error("target out of range")]
    OutOfRange,
    #[error("seat already taken")]
    SeatTaken,
    #[error("unknown room")]
    UnknownRoom,
    #[error("wrong room password")]
    WrongPassword,
    #[error("room already has a host")]
    RoomFull,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooldown_message_carries_remaining_time() {
        let rejection = Rejection::OnCooldown { remaining_ms: 420 };
        assert_eq!(rejection.to_string(), "on cooldown for another 420ms");
    }
}
