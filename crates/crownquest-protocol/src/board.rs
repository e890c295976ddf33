//! The game board as it travels on the wire.
//!
//! A grid is produced once per room by an external generator and never
//! changes afterwards. Every client fetches its own copy, so the grid also
//! carries a content hash clients use to check they are all playing on
//! the same board.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ProtocolError;

/// Index of a space on the board.
pub type SpaceId = u32;

/// Side length of the square board.
pub const GRID_WIDTH: u32 = 5;

/// Number of spaces on a standard board.
pub const GRID_SIZE: u32 = GRID_WIDTH * GRID_WIDTH;

/// What happens when a player lands on a space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpaceType {
    Start,
    Good,
    Bad,
    Combat,
    Teleport,
    #[serde(rename = "Shadow Realm", alias = "ShadowRealm")]
    ShadowRealm,
    Crown,
    Shop,
    Neutral,
}

impl SpaceType {
    pub fn label(self) -> &'static str {
        match self {
            Self::Start => "Start",
            Self::Good => "Good",
            Self::Bad => "Bad",
            Self::Combat => "Combat",
            Self::Teleport => "Teleport",
            Self::ShadowRealm => "Shadow Realm",
            Self::Crown => "Crown",
            Self::Shop => "Shop",
            Self::Neutral => "Neutral",
        }
    }
}

impl fmt::Display for SpaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One space on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    pub id: SpaceId,
    #[serde(rename = "type")]
    pub kind: SpaceType,
    pub connections: Vec<SpaceId>,
}

/// The whole board: `{"spaces": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    pub spaces: Vec<Space>,
}

impl Grid {
    pub fn space(&self, id: SpaceId) -> Option<&Space> {
        self.spaces.iter().find(|s| s.id == id)
    }

    pub fn kind_of(&self, id: SpaceId) -> Option<SpaceType> {
        self.space(id).map(|s| s.kind)
    }

    /// Neighbors of `id`; empty for an unknown space.
    pub fn neighbors(&self, id: SpaceId) -> &[SpaceId] {
        self.space(id).map_or(&[], |s| s.connections.as_slice())
    }

    pub fn is_adjacent(&self, from: SpaceId, to: SpaceId) -> bool {
        self.neighbors(from).contains(&to)
    }

    /// First space of the given type, if the board has one.
    pub fn first_of(&self, kind: SpaceType) -> Option<SpaceId> {
        self.spaces.iter().find(|s| s.kind == kind).map(|s| s.id)
    }

    pub fn ids(&self) -> impl Iterator<Item = SpaceId> + '_ {
        self.spaces.iter().map(|s| s.id)
    }

    /// Checks the structural rules every generated grid must satisfy:
    /// unique ids, connections that point at real spaces, no self-loops,
    /// and symmetric adjacency.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        let mut seen = HashSet::new();
        for space in &self.spaces {
            if !seen.insert(space.id) {
                return Err(ProtocolError::InvalidMessage(format!(
                    "duplicate space id {}",
                    space.id
                )));
            }
        }
        for space in &self.spaces {
            for &other in &space.connections {
                if other == space.id {
                    return Err(ProtocolError::InvalidMessage(format!(
                        "space {} connects to itself",
                        space.id
                    )));
                }
                if !seen.contains(&other) {
                    return Err(ProtocolError::InvalidMessage(format!(
                        "space {} connects to unknown space {other}",
                        space.id
                    )));
                }
                if !self.is_adjacent(other, space.id) {
                    return Err(ProtocolError::InvalidMessage(format!(
                        "connection {} -> {other} is one-way",
                        space.id
                    )));
                }
            }
        }
        Ok(())
    }

    /// SHA-256 of a canonical rendering of the board, hex encoded.
    ///
    /// Spaces are ordered by id and connection lists are sorted, so two
    /// grids that differ only in listing order hash the same.
    pub fn content_hash(&self) -> String {
        let mut canonical: Vec<(SpaceId, SpaceType, BTreeSet<SpaceId>)> = self
            .spaces
            .iter()
            .map(|s| (s.id, s.kind, s.connections.iter().copied().collect()))
            .collect();
        canonical.sort_by_key(|(id, _, _)| *id);

        let mut hasher = Sha256::new();
        for (id, kind, connections) in &canonical {
            hasher.update(id.to_le_bytes());
            hasher.update(kind.label().as_bytes());
            hasher.update([0u8]);
            for c in connections {
                hasher.update(c.to_le_bytes());
            }
            hasher.update([0xffu8]);
        }
        format!("{:x}", hasher.finalize())
    }
}
