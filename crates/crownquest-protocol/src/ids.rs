//! Identity types for rooms and players.
//!
//! Both ids are short random base-36 strings handed out by the server.
//! Clients treat them as opaque and echo them back verbatim, so they are
//! newtypes over `String` serialized transparently.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Number of characters in a generated id.
pub const ID_LEN: usize = 8;

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn random_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..ID_LEN)
        .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

/// A unique identifier for a player within a room.
///
/// The same id survives reconnects: a player who comes back under the
/// same name gets their old id back.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Draws a fresh random id.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(random_id(rng))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A unique identifier for a room (one game session).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Draws a fresh random id.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(random_id(rng))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
