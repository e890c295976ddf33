//! Session types: the server's record of one connection.
//!
//! A session tracks:
//! - WHICH connection it belongs to (`ConnectionId`)
//! - WHAT state it is in (connected, disconnected, expired)
//! - WHO it speaks for, once a `create` or `join` succeeded (`Binding`)

use std::time::{Duration, Instant};

use crownquest_protocol::{PlayerId, RoomId};
use crownquest_transport::ConnectionId;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for session behavior.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long (in seconds) a room survives after one of its players
    /// disconnects with nobody else attached.
    ///
    /// Default: 300 seconds.
    pub abandon_grace_secs: u64,
}

impl SessionConfig {
    pub fn abandon_grace(&self) -> Duration {
        Duration::from_secs(self.abandon_grace_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            abandon_grace_secs: 300,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Lifecycle of a session.
///
/// ```text
///   Connected ──(disconnect)──→ Disconnected ──(grace elapsed)──→ Expired
/// ```
///
/// A disconnected session never comes back: a returning browser opens a
/// new connection and rejoins by name. The disconnected record only keeps
/// its room alive until the grace period runs out.
#[derive(Debug, Clone)]
pub enum SessionState {
    Connected,
    Disconnected { since: Instant },
    Expired,
}

// ---------------------------------------------------------------------------
// Binding
// ---------------------------------------------------------------------------

/// The room and player a connection acts for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Binding {
    pub room_id: RoomId,
    pub player_id: PlayerId,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A single connection's session on the server.
#[derive(Debug, Clone)]
pub struct Session {
    pub connection_id: ConnectionId,
    pub state: SessionState,
    /// Set by `create`/`join`, cleared by `leaveRoom`.
    pub binding: Option<Binding>,
}

impl Session {
    /// Whether this session still counts as someone being in its room.
    ///
    /// Connected sessions always do; disconnected ones only until `grace`
    /// has passed.
    pub fn is_live(&self, grace: Duration) -> bool {
        match &self.state {
            SessionState::Connected => true,
            SessionState::Disconnected { since } => since.elapsed() < grace,
            SessionState::Expired => false,
        }
    }
}
