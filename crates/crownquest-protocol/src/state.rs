//! The room snapshot: the single serializable aggregate the server keeps
//! per room and rebroadcasts after every change.
//!
//! Field names follow the browser client's camelCase JSON. Every map or
//! list here has a deterministic order, so encoding a decoded snapshot
//! reproduces the input bytes exactly.

use serde::{Deserialize, Deserializer, Serialize};

use crate::board::SpaceId;
use crate::ids::PlayerId;

/// Gold is signed: a player can dip below zero for the instant between
/// a charge and the forced item sale that covers it.
pub type Gold = i64;

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// Every purchasable item. Serialized as its display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Item {
    #[serde(rename = "Scout Lens")]
    ScoutLens,
    #[serde(rename = "Chaos Swap")]
    ChaosSwap,
    #[serde(rename = "Crown Compass")]
    CrownCompass,
    #[serde(rename = "Thief's Snare")]
    ThiefsSnare,
    #[serde(rename = "Bounty Drop")]
    BountyDrop,
    #[serde(rename = "Misfortune Curse")]
    MisfortuneCurse,
    #[serde(rename = "Close-Quarters Heist")]
    CloseQuartersHeist,
    #[serde(rename = "Wandering Goblin")]
    WanderingGoblin,
    #[serde(rename = "Warding Talisman")]
    WardingTalisman,
}

impl Item {
    /// The shop catalog, in display order.
    pub const CATALOG: [Item; 9] = [
        Item::ScoutLens,
        Item::ChaosSwap,
        Item::CrownCompass,
        Item::ThiefsSnare,
        Item::BountyDrop,
        Item::MisfortuneCurse,
        Item::CloseQuartersHeist,
        Item::WanderingGoblin,
        Item::WardingTalisman,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::ScoutLens => "Scout Lens",
            Self::ChaosSwap => "Chaos Swap",
            Self::CrownCompass => "Crown Compass",
            Self::ThiefsSnare => "Thief's Snare",
            Self::BountyDrop => "Bounty Drop",
            Self::MisfortuneCurse => "Misfortune Curse",
            Self::CloseQuartersHeist => "Close-Quarters Heist",
            Self::WanderingGoblin => "Wandering Goblin",
            Self::WardingTalisman => "Warding Talisman",
        }
    }

    pub fn cost(self) -> Gold {
        match self {
            Self::ScoutLens | Self::BountyDrop => 2,
            Self::CrownCompass | Self::ThiefsSnare => 3,
            Self::ChaosSwap | Self::CloseQuartersHeist => 4,
            Self::MisfortuneCurse | Self::WanderingGoblin => 5,
            Self::WardingTalisman => 6,
        }
    }

    /// How many a player may hold at once; `None` means unlimited.
    pub fn max_held(self) -> Option<usize> {
        match self {
            Self::ScoutLens | Self::BountyDrop => None,
            Self::ChaosSwap
            | Self::ThiefsSnare
            | Self::CloseQuartersHeist
            | Self::WardingTalisman => Some(2),
            Self::CrownCompass => Some(3),
            Self::MisfortuneCurse | Self::WanderingGoblin => Some(1),
        }
    }

    /// What a forced sale pays: half the cost, rounded down.
    pub fn resale_value(self) -> Gold {
        self.cost() / 2
    }
}

impl std::fmt::Display for Item {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Wheels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WheelKind {
    Good,
    Bad,
    Combat,
    Shadow,
}

impl std::fmt::Display for WheelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Good => "Good",
            Self::Bad => "Bad",
            Self::Combat => "Combat",
            Self::Shadow => "Shadow",
        })
    }
}

// ---------------------------------------------------------------------------
// Players and board artifacts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub gold: Gold,
    #[serde(default)]
    pub items: Vec<Item>,
    pub position: SpaceId,
    #[serde(default)]
    pub has_moved: bool,
    #[serde(default)]
    pub shadow_turns: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spins_remaining: Option<u32>,
    /// A wheel the player landed on and has not spun yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_wheel: Option<WheelKind>,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>, gold: Gold, position: SpaceId) -> Self {
        Self {
            id,
            name: name.into(),
            gold,
            items: Vec::new(),
            position,
            has_moved: false,
            shadow_turns: 0,
            spins_remaining: None,
            pending_wheel: None,
        }
    }

    pub fn count_of(&self, item: Item) -> usize {
        self.items.iter().filter(|i| **i == item).count()
    }

    /// Removes one copy of `item`. Returns false if the player had none.
    pub fn take_item(&mut self, item: Item) -> bool {
        match self.items.iter().position(|i| *i == item) {
            Some(idx) => {
                self.items.remove(idx);
                true
            }
            None => false,
        }
    }
}

/// A hidden snare; fires on the first non-owner to land on `space`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trap {
    pub space: SpaceId,
    pub owner: PlayerId,
}

/// A wandering thief token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goblin {
    pub space: SpaceId,
    pub owner: PlayerId,
    /// Moves taken so far. Forced to the limit once the goblin scores.
    pub moves: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoldPile {
    pub space: SpaceId,
    pub amount: Gold,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// The full room state broadcast as `state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub players: Vec<Player>,
    pub current_player: Option<PlayerId>,
    pub round: u32,
    pub turn_order: Vec<PlayerId>,
    pub log: Vec<String>,
    pub memory_mode: bool,
    pub random_start_space: bool,
    pub start_space_id: SpaceId,
    #[serde(default)]
    pub traps: Vec<Trap>,
    #[serde(default)]
    pub goblins: Vec<Goblin>,
    #[serde(default)]
    pub gold_piles: Vec<GoldPile>,
    #[serde(default)]
    pub game_over: bool,
    #[serde(default)]
    pub shop_access: bool,
    #[serde(default)]
    pub init_complete: bool,
    /// Bumped by the server on every applied change.
    #[serde(default)]
    pub version: u64,
}

impl RoomSnapshot {
    /// A fresh room with nobody in it yet.
    pub fn new(memory_mode: bool, random_start_space: bool, start_space_id: SpaceId) -> Self {
        Self {
            players: Vec::new(),
            current_player: None,
            round: 1,
            turn_order: Vec::new(),
            log: Vec::new(),
            memory_mode,
            random_start_space,
            start_space_id,
            traps: Vec::new(),
            goblins: Vec::new(),
            gold_piles: Vec::new(),
            game_over: false,
            shop_access: false,
            init_complete: false,
            version: 0,
        }
    }

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| &p.id == id)
    }

    pub fn player_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| &p.id == id)
    }

    /// Case-insensitive name lookup.
    pub fn player_named(&self, name: &str) -> Option<&Player> {
        self.players
            .iter()
            .find(|p| p.name.to_lowercase() == name.to_lowercase())
    }

    pub fn is_current(&self, id: &PlayerId) -> bool {
        self.current_player.as_ref() == Some(id)
    }
}

// ---------------------------------------------------------------------------
// Patches
// ---------------------------------------------------------------------------

/// Deserializes a present-but-maybe-null field as `Some(inner)`, so a
/// patch can tell "absent" (`None`) apart from "set to null" (`Some(None)`).
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Field-level update for one player; `id` selects the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerPatch {
    pub id: PlayerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gold: Option<Gold>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<Item>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<SpaceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_moved: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow_turns: Option<u32>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub spins_remaining: Option<Option<u32>>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub pending_wheel: Option<Option<WheelKind>>,
}

impl From<&Player> for PlayerPatch {
    fn from(p: &Player) -> Self {
        Self {
            id: p.id.clone(),
            name: Some(p.name.clone()),
            gold: Some(p.gold),
            items: Some(p.items.clone()),
            position: Some(p.position),
            has_moved: Some(p.has_moved),
            shadow_turns: Some(p.shadow_turns),
            spins_remaining: Some(p.spins_remaining),
            pending_wheel: Some(p.pending_wheel),
        }
    }
}

/// The payload of an `update`: any subset of the snapshot's keys.
///
/// `initComplete` and `version` are owned by the server and cannot be
/// patched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatePatch {
    /// The snapshot version the sender last saw.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub players: Option<Vec<PlayerPatch>>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub current_player: Option<Option<PlayerId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_order: Option<Vec<PlayerId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_mode: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub random_start_space: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_space_id: Option<SpaceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traps: Option<Vec<Trap>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goblins: Option<Vec<Goblin>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gold_piles: Option<Vec<GoldPile>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_over: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shop_access: Option<bool>,
}

impl From<&RoomSnapshot> for StatePatch {
    /// The whole local mirror as a patch. This is what clients publish
    /// after a move.
    fn from(s: &RoomSnapshot) -> Self {
        Self {
            base_version: Some(s.version),
            players: Some(s.players.iter().map(PlayerPatch::from).collect()),
            current_player: Some(s.current_player.clone()),
            round: Some(s.round),
            turn_order: Some(s.turn_order.clone()),
            log: Some(s.log.clone()),
            memory_mode: Some(s.memory_mode),
            random_start_space: Some(s.random_start_space),
            start_space_id: Some(s.start_space_id),
            traps: Some(s.traps.clone()),
            goblins: Some(s.goblins.clone()),
            gold_piles: Some(s.gold_piles.clone()),
            game_over: Some(s.game_over),
            shop_access: Some(s.shop_access),
        }
    }
}
