//! Room configuration and lifecycle phase.

use crownquest_protocol::{GRID_SIZE, Gold, RoomSnapshot, SpaceId};
use rand::Rng;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Settings shared by every room a [`RoomManager`](crate::RoomManager)
/// creates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Seats per room. The game starts when the roster reaches this size.
    pub max_players: usize,

    /// Start space when the creator does not ask for a random one.
    pub default_start_space: SpaceId,

    /// Number of spaces a random start is drawn from.
    pub board_size: u32,

    /// Gold every new player begins with.
    pub starting_gold: Gold,

    /// Refuse an `update` whose `baseVersion` is older than the stored
    /// snapshot. Off means plain last-write-wins.
    pub reject_stale_updates: bool,

    /// Capacity of each room actor's command channel.
    pub channel_size: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_players: 3,
            default_start_space: 12,
            board_size: GRID_SIZE,
            starting_gold: 1,
            reject_stale_updates: false,
            channel_size: 64,
        }
    }
}

impl RoomConfig {
    /// Picks the start space for a new room.
    pub fn start_space<R: Rng + ?Sized>(&self, random: bool, rng: &mut R) -> SpaceId {
        if random && self.board_size > 0 {
            rng.random_range(0..self.board_size)
        } else {
            self.default_start_space
        }
    }
}

// ---------------------------------------------------------------------------
// RoomPhase
// ---------------------------------------------------------------------------

/// Where a room is in its life, read off the snapshot.
///
/// ```text
/// WaitingForPlayers → InProgress → Finished
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomPhase {
    WaitingForPlayers,
    InProgress,
    Finished,
}

impl RoomPhase {
    pub fn of(snapshot: &RoomSnapshot) -> Self {
        if snapshot.game_over {
            Self::Finished
        } else if snapshot.init_complete {
            Self::InProgress
        } else {
            Self::WaitingForPlayers
        }
    }

    pub fn is_joinable(self) -> bool {
        matches!(self, Self::WaitingForPlayers)
    }
}

impl std::fmt::Display for RoomPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WaitingForPlayers => write!(f, "WaitingForPlayers"),
            Self::InProgress => write!(f, "InProgress"),
            Self::Finished => write!(f, "Finished"),
        }
    }
}
