//! The mutable view every rule operates on.
//!
//! A [`GameContext`] bundles the local snapshot mirror, the immutable
//! grid, a random source, and a [`Chooser`] standing in for the human at
//! the keyboard. Rules borrow it for the duration of one action; the
//! client publishes the snapshot afterwards.

use crownquest_protocol::{Gold, Grid, Item, Player, PlayerId, RoomSnapshot, SpaceId, SpaceType};
use rand::{Rng, RngCore};

use crate::GameError;

// ---------------------------------------------------------------------------
// Chooser
// ---------------------------------------------------------------------------

/// Why a rule is asking the player to pick somebody.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetPurpose {
    SendToShadowRealm,
    GiveItem,
    GiveAllGold,
    InviteFriend,
}

/// Decisions that belong to a player rather than to the dice.
///
/// The browser answers these with modal dialogs; bots and tests plug in
/// a fixed policy.
pub trait Chooser {
    /// Pick an owned item to sell toward `shortfall`. `None` stops selling.
    fn item_to_sell(&mut self, seller: &Player, shortfall: Gold) -> Option<Item>;

    /// Pick one of `candidates`. `None` cancels the effect.
    fn target(&mut self, purpose: TargetPurpose, candidates: &[PlayerId]) -> Option<PlayerId>;

    /// Pick an owned item to hand over.
    fn item_to_give(&mut self, giver: &Player) -> Option<Item>;
}

/// Always takes the first option offered; sells the cheapest item first.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstChoice;

impl Chooser for FirstChoice {
    fn item_to_sell(&mut self, seller: &Player, _shortfall: Gold) -> Option<Item> {
        seller.items.iter().copied().min_by_key(|i| i.cost())
    }

    fn target(&mut self, _purpose: TargetPurpose, candidates: &[PlayerId]) -> Option<PlayerId> {
        candidates.first().cloned()
    }

    fn item_to_give(&mut self, giver: &Player) -> Option<Item> {
        giver.items.first().copied()
    }
}

/// Declines every decision: never sells, never picks.
#[derive(Debug, Clone, Copy, Default)]
pub struct Decline;

impl Chooser for Decline {
    fn item_to_sell(&mut self, _: &Player, _: Gold) -> Option<Item> {
        None
    }

    fn target(&mut self, _: TargetPurpose, _: &[PlayerId]) -> Option<PlayerId> {
        None
    }

    fn item_to_give(&mut self, _: &Player) -> Option<Item> {
        None
    }
}

// ---------------------------------------------------------------------------
// GameContext
// ---------------------------------------------------------------------------

pub struct GameContext<'a> {
    pub state: &'a mut RoomSnapshot,
    pub grid: &'a Grid,
    pub rng: &'a mut dyn RngCore,
    pub chooser: &'a mut dyn Chooser,
}

impl<'a> GameContext<'a> {
    pub fn new(
        state: &'a mut RoomSnapshot,
        grid: &'a Grid,
        rng: &'a mut dyn RngCore,
        chooser: &'a mut dyn Chooser,
    ) -> Self {
        Self { state, grid, rng, chooser }
    }

    /// Appends a line to the shared log.
    pub fn log(&mut self, line: impl Into<String>) {
        self.state.log.push(line.into());
    }

    pub fn player(&self, id: &PlayerId) -> Result<&Player, GameError> {
        self.state
            .player(id)
            .ok_or_else(|| GameError::UnknownPlayer(id.clone()))
    }

    pub fn player_mut(&mut self, id: &PlayerId) -> Result<&mut Player, GameError> {
        self.state
            .player_mut(id)
            .ok_or_else(|| GameError::UnknownPlayer(id.clone()))
    }

    pub fn name_of(&self, id: &PlayerId) -> Result<String, GameError> {
        self.player(id).map(|p| p.name.clone())
    }

    pub fn space_kind(&self, id: SpaceId) -> Result<SpaceType, GameError> {
        self.grid.kind_of(id).ok_or(GameError::UnknownSpace(id))
    }

    pub fn shadow_realm(&self) -> Result<SpaceId, GameError> {
        self.grid
            .first_of(SpaceType::ShadowRealm)
            .ok_or(GameError::MissingSpace(SpaceType::ShadowRealm))
    }

    /// The Start space; falls back to the configured start id.
    pub fn start_space(&self) -> SpaceId {
        self.grid
            .first_of(SpaceType::Start)
            .unwrap_or(self.state.start_space_id)
    }

    /// Uniform pick from a slice.
    pub fn pick<T: Clone>(&mut self, options: &[T]) -> Option<T> {
        if options.is_empty() {
            return None;
        }
        let idx = self.rng.random_range(0..options.len());
        Some(options[idx].clone())
    }

    /// Every space that is neither `from` nor adjacent to it.
    pub fn non_adjacent(&self, from: SpaceId) -> Vec<SpaceId> {
        let neighbors = self.grid.neighbors(from);
        self.grid
            .ids()
            .filter(|id| *id != from && !neighbors.contains(id))
            .collect()
    }

    /// Sends `id` to the Shadow Realm and bumps their shadow counter.
    pub fn banish(&mut self, id: &PlayerId) -> Result<(), GameError> {
        let realm = self.shadow_realm()?;
        let player = self.player_mut(id)?;
        player.position = realm;
        player.shadow_turns += 1;
        Ok(())
    }

    /// Forced liquidation: asks the player to sell items at half cost until
    /// their gold reaches `target` or they stop choosing.
    pub fn liquidate(&mut self, id: &PlayerId, target: Gold) -> Result<(), GameError> {
        loop {
            let player = self
                .state
                .player(id)
                .ok_or_else(|| GameError::UnknownPlayer(id.clone()))?;
            if player.gold >= target || player.items.is_empty() {
                return Ok(());
            }
            let shortfall = target - player.gold;
            let Some(item) = self.chooser.item_to_sell(player, shortfall) else {
                return Ok(());
            };
            let player = self.player_mut(id)?;
            if !player.take_item(item) {
                // Chooser named an item the player does not hold.
                return Ok(());
            }
            let refund = item.resale_value();
            player.gold += refund;
            let name = player.name.clone();
            self.log(format!("{name} sold {item} for {refund} gold."));
        }
    }

    /// Takes up to `cap` gold from `id`, selling items first if they hold
    /// less than `cap`. Returns the amount actually taken.
    pub fn take_gold(&mut self, id: &PlayerId, cap: Gold) -> Result<Gold, GameError> {
        self.liquidate(id, cap)?;
        let player = self.player_mut(id)?;
        let amount = cap.min(player.gold.max(0));
        player.gold -= amount;
        Ok(amount)
    }

    /// Ids of players other than `id` standing on `id`'s space.
    pub fn co_located(&self, id: &PlayerId) -> Result<Vec<PlayerId>, GameError> {
        let pos = self.player(id)?.position;
        Ok(self
            .state
            .players
            .iter()
            .filter(|p| p.position == pos && &p.id != id)
            .map(|p| p.id.clone())
            .collect())
    }

    pub fn others(&self, id: &PlayerId) -> Vec<PlayerId> {
        self.state
            .players
            .iter()
            .filter(|p| &p.id != id)
            .map(|p| p.id.clone())
            .collect()
    }
}
