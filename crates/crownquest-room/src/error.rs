//! Error types for the room layer.
//!
//! The display strings of the first four variants are shown to players
//! verbatim, so they are worded for the browser rather than for logs.

use crownquest_protocol::{PlayerId, RoomId};

/// Errors that can occur during room operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist (never created, or already deleted).
    #[error("Room does not exist")]
    NotFound(RoomId),

    /// Every seat is taken and the name matches nobody already seated.
    #[error("Room is full")]
    RoomFull(RoomId),

    /// The external grid generator failed; no room was stored.
    #[error("Failed to generate grid")]
    GridUnavailable(String),

    /// An `update` was based on an older snapshot than the stored one.
    #[error("Stale update")]
    StaleUpdate { base: u64, current: u64 },

    /// The player is not seated in this room.
    #[error("Player not found in room")]
    NotInRoom(PlayerId, RoomId),

    /// The room's command channel is full or closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),
}
