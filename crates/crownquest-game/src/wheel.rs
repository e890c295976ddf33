//! Chance wheels and their outcome handlers.
//!
//! A [`Wheel`] is an ordered list of slots; a spin picks one uniformly.
//! The Shadow wheel is rebuilt from the spinner's `shadowTurns` so that
//! the longer someone is trapped, the more Return Home slots it carries.

use std::fmt;

use crownquest_protocol::{CombatResult, Item, MinigameKind, PlayerId};
pub use crownquest_protocol::WheelKind;
use rand::Rng;

use crate::context::TargetPurpose;
use crate::{GameContext, GameError, TurnViolation};

/// Total slots on the Shadow wheel.
pub const SHADOW_SLOTS: usize = 8;
/// Cap on Return Home slots.
pub const MAX_RETURN_HOME: usize = 6;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoodOutcome {
    PlusTwo,
    PlusThree,
    PlusFive,
    DoubleGold,
    SendToShadowRealm,
    AccessShop,
    FreeScoutLens,
    GoAgain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadOutcome {
    MinusTwo,
    GoToShadowRealm,
    ReturnHome,
    NoEffect,
    SpinAgain,
    GiveItemAway,
    GiveAllGoldAway,
    SwapPlaces,
    Teleport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowOutcome {
    ReturnHome,
    InviteFriend,
    LoseOne,
    Nothing,
}

/// One wheel slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Good(GoodOutcome),
    Bad(BadOutcome),
    Combat(CombatResult),
    Shadow(ShadowOutcome),
}

impl Outcome {
    pub fn wheel(self) -> WheelKind {
        match self {
            Self::Good(_) => WheelKind::Good,
            Self::Bad(_) => WheelKind::Bad,
            Self::Combat(_) => WheelKind::Combat,
            Self::Shadow(_) => WheelKind::Shadow,
        }
    }

    /// Text printed on the slot.
    pub fn label(self) -> &'static str {
        match self {
            Self::Good(g) => match g {
                GoodOutcome::PlusTwo => "+2 Gold",
                GoodOutcome::PlusThree => "+3 Gold",
                GoodOutcome::PlusFive => "+5 Gold",
                GoodOutcome::DoubleGold => "x2 Gold",
                GoodOutcome::SendToShadowRealm => "Send Someone to Shadow Realm",
                GoodOutcome::AccessShop => "Access Shop",
                GoodOutcome::FreeScoutLens => "Free Scout Lens",
                GoodOutcome::GoAgain => "Go Again",
            },
            Self::Bad(b) => match b {
                BadOutcome::MinusTwo => "-2 Gold",
                BadOutcome::GoToShadowRealm => "Go to Shadow Realm",
                BadOutcome::ReturnHome => "Return Home",
                BadOutcome::NoEffect => "No Effect",
                BadOutcome::SpinAgain => "Spin Again",
                BadOutcome::GiveItemAway => "Give Item Away",
                BadOutcome::GiveAllGoldAway => "Give All Gold Away",
                BadOutcome::SwapPlaces => "Swap Places",
                BadOutcome::Teleport => "Teleport",
            },
            Self::Combat(c) => match c {
                CombatResult::Steal => "Steal",
                CombatResult::Shadow => "Shadow",
                CombatResult::Truce => "Truce",
                CombatResult::NoEffect => "No Effect",
            },
            Self::Shadow(s) => match s {
                ShadowOutcome::ReturnHome => "Return Home",
                ShadowOutcome::InviteFriend => "Invite Friend",
                ShadowOutcome::LoseOne => "-1 Gold",
                ShadowOutcome::Nothing => "Nothing",
            },
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Wheel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wheel {
    pub kind: WheelKind,
    pub slots: Vec<Outcome>,
}

impl Wheel {
    pub fn good() -> Self {
        use GoodOutcome::*;
        let slots = [
            PlusTwo,
            PlusThree,
            PlusFive,
            DoubleGold,
            SendToShadowRealm,
            AccessShop,
            FreeScoutLens,
            GoAgain,
        ];
        Self { kind: WheelKind::Good, slots: slots.into_iter().map(Outcome::Good).collect() }
    }

    pub fn bad() -> Self {
        use BadOutcome::*;
        let slots = [
            MinusTwo,
            GoToShadowRealm,
            ReturnHome,
            NoEffect,
            SpinAgain,
            GiveItemAway,
            GiveAllGoldAway,
            SwapPlaces,
            Teleport,
        ];
        Self { kind: WheelKind::Bad, slots: slots.into_iter().map(Outcome::Bad).collect() }
    }

    pub fn combat() -> Self {
        use CombatResult::*;
        let slots = [Steal, Shadow, Truce, NoEffect];
        Self { kind: WheelKind::Combat, slots: slots.into_iter().map(Outcome::Combat).collect() }
    }

    /// Shadow wheel for a player who has spent `shadow_turns` turns trapped.
    pub fn shadow(shadow_turns: u32) -> Self {
        let home = (shadow_turns.max(1) as usize).min(MAX_RETURN_HOME);
        let mut slots = vec![
            Outcome::Shadow(ShadowOutcome::InviteFriend),
            Outcome::Shadow(ShadowOutcome::LoseOne),
        ];
        slots.extend(std::iter::repeat_n(Outcome::Shadow(ShadowOutcome::ReturnHome), home));
        slots.resize(SHADOW_SLOTS, Outcome::Shadow(ShadowOutcome::Nothing));
        Self { kind: WheelKind::Shadow, slots }
    }

    pub fn for_kind(kind: WheelKind, shadow_turns: u32) -> Self {
        match kind {
            WheelKind::Good => Self::good(),
            WheelKind::Bad => Self::bad(),
            WheelKind::Combat => Self::combat(),
            WheelKind::Shadow => Self::shadow(shadow_turns),
        }
    }

    /// Uniform pick over the slots.
    pub fn spin<R: Rng + ?Sized>(&self, rng: &mut R) -> Outcome {
        self.slots[rng.random_range(0..self.slots.len())]
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// What the caller must do after an outcome is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WheelResolution {
    Done,
    /// Re-open the given wheel.
    SpinAgain(WheelKind),
    /// Announce and play a minigame; its reward depends on `combat`.
    StartMinigame {
        combat: CombatResult,
        game: MinigameKind,
    },
}

/// Spins the wheel `kind` for `actor` and applies the result.
pub fn spin_and_resolve(
    ctx: &mut GameContext<'_>,
    actor: &PlayerId,
    kind: WheelKind,
) -> Result<(Outcome, WheelResolution), GameError> {
    let turns = ctx.player(actor)?.shadow_turns;
    let outcome = Wheel::for_kind(kind, turns).spin(&mut *ctx.rng);
    let resolution = resolve(ctx, actor, outcome)?;
    Ok((outcome, resolution))
}

/// Applies a wheel outcome to `actor`, who must hold the turn.
pub fn resolve(
    ctx: &mut GameContext<'_>,
    actor: &PlayerId,
    outcome: Outcome,
) -> Result<WheelResolution, GameError> {
    if ctx.state.game_over {
        return Err(TurnViolation::GameOver.into());
    }
    if !ctx.state.is_current(actor) {
        tracing::warn!(%actor, %outcome, "wheel spun out of turn");
        return Err(TurnViolation::NotYourTurn.into());
    }
    let name = ctx.name_of(actor)?;
    if outcome.wheel() != WheelKind::Shadow {
        ctx.player_mut(actor)?.pending_wheel = None;
    }
    let resolution = match outcome {
        Outcome::Good(good) => resolve_good(ctx, actor, &name, good)?,
        Outcome::Bad(bad) => {
            let resolution = resolve_bad(ctx, actor, &name, bad)?;
            if resolution == WheelResolution::Done {
                consume_spin(ctx, actor)?;
            }
            resolution
        }
        Outcome::Combat(combat) => {
            let game = ctx.pick(&MinigameKind::ALL).unwrap_or(MinigameKind::GridCapture);
            ctx.log(format!("{name} spun Combat wheel: {combat}"));
            WheelResolution::StartMinigame { combat, game }
        }
        Outcome::Shadow(shadow) => resolve_shadow(ctx, actor, &name, shadow)?,
    };
    tracing::debug!(%actor, %outcome, ?resolution, "wheel resolved");
    Ok(resolution)
}

/// Chooser pick restricted to `candidates`, falling back to a random one.
fn choose_target(
    ctx: &mut GameContext<'_>,
    purpose: TargetPurpose,
    candidates: &[PlayerId],
) -> Option<PlayerId> {
    ctx.chooser
        .target(purpose, candidates)
        .filter(|t| candidates.contains(t))
        .or_else(|| ctx.pick(candidates))
}

fn resolve_good(
    ctx: &mut GameContext<'_>,
    actor: &PlayerId,
    name: &str,
    outcome: GoodOutcome,
) -> Result<WheelResolution, GameError> {
    let line = match outcome {
        GoodOutcome::PlusTwo | GoodOutcome::PlusThree | GoodOutcome::PlusFive => {
            let amount = match outcome {
                GoodOutcome::PlusTwo => 2,
                GoodOutcome::PlusThree => 3,
                _ => 5,
            };
            ctx.player_mut(actor)?.gold += amount;
            format!("Gained {amount} gold")
        }
        GoodOutcome::DoubleGold => {
            let player = ctx.player_mut(actor)?;
            player.gold *= 2;
            format!("Gold doubled to {}", player.gold)
        }
        GoodOutcome::SendToShadowRealm => {
            let others = ctx.others(actor);
            match choose_target(ctx, TargetPurpose::SendToShadowRealm, &others) {
                Some(target) => {
                    ctx.banish(&target)?;
                    format!("Sent {} to Shadow Realm", ctx.name_of(&target)?)
                }
                None => "Nobody to send to Shadow Realm".to_string(),
            }
        }
        GoodOutcome::AccessShop => {
            ctx.state.shop_access = true;
            "Gained shop access this turn".to_string()
        }
        GoodOutcome::FreeScoutLens => {
            ctx.player_mut(actor)?.items.push(Item::ScoutLens);
            "Gained Scout Lens".to_string()
        }
        GoodOutcome::GoAgain => {
            ctx.player_mut(actor)?.has_moved = false;
            "Get an extra move!".to_string()
        }
    };
    ctx.log(format!("{name} spun Good wheel: {line}"));
    Ok(WheelResolution::Done)
}

fn resolve_bad(
    ctx: &mut GameContext<'_>,
    actor: &PlayerId,
    name: &str,
    outcome: BadOutcome,
) -> Result<WheelResolution, GameError> {
    let line = match outcome {
        BadOutcome::MinusTwo => match ctx.take_gold(actor, 2)? {
            0 => "No gold to lose".to_string(),
            amount => format!("Lost {amount} gold"),
        },
        BadOutcome::GoToShadowRealm => {
            ctx.banish(actor)?;
            "Sent to Shadow Realm".to_string()
        }
        BadOutcome::ReturnHome => {
            let start = ctx.start_space();
            let player = ctx.player_mut(actor)?;
            player.position = start;
            player.has_moved = true;
            "Returned to Start".to_string()
        }
        BadOutcome::NoEffect => "No effect".to_string(),
        BadOutcome::SpinAgain => {
            let player = ctx.player_mut(actor)?;
            player.spins_remaining = Some(player.spins_remaining.unwrap_or(0) + 1);
            player.pending_wheel = Some(WheelKind::Bad);
            ctx.log(format!("{name} spun Bad wheel: Must spin again!"));
            return Ok(WheelResolution::SpinAgain(WheelKind::Bad));
        }
        BadOutcome::GiveItemAway => give_item_away(ctx, actor)?,
        BadOutcome::GiveAllGoldAway => {
            let others = ctx.others(actor);
            match choose_target(ctx, TargetPurpose::GiveAllGold, &others) {
                Some(target) => {
                    let player = ctx.player_mut(actor)?;
                    let amount = player.gold.max(0);
                    player.gold -= amount;
                    ctx.player_mut(&target)?.gold += amount;
                    format!("Gave {amount} gold to {}", ctx.name_of(&target)?)
                }
                None => "Nobody to give gold to".to_string(),
            }
        }
        BadOutcome::SwapPlaces => {
            let others = ctx.others(actor);
            match ctx.pick(&others) {
                Some(target) => {
                    let mine = ctx.player(actor)?.position;
                    let theirs = ctx.player(&target)?.position;
                    ctx.player_mut(&target)?.position = mine;
                    let player = ctx.player_mut(actor)?;
                    player.position = theirs;
                    player.has_moved = true;
                    format!("Swapped places with {}", ctx.name_of(&target)?)
                }
                None => "Nobody to swap with".to_string(),
            }
        }
        BadOutcome::Teleport => {
            let here = ctx.player(actor)?.position;
            let choices = ctx.non_adjacent(here);
            match ctx.pick(&choices) {
                Some(dest) => {
                    let kind = ctx.space_kind(dest)?;
                    let player = ctx.player_mut(actor)?;
                    player.position = dest;
                    player.has_moved = true;
                    format!("Teleported to {kind}")
                }
                None => "Nowhere to teleport".to_string(),
            }
        }
    };
    ctx.log(format!("{name} spun Bad wheel: {line}"));
    Ok(WheelResolution::Done)
}

fn give_item_away(ctx: &mut GameContext<'_>, actor: &PlayerId) -> Result<String, GameError> {
    let giver = ctx
        .state
        .player(actor)
        .ok_or_else(|| GameError::UnknownPlayer(actor.clone()))?;
    let Some(first) = giver.items.first().copied() else {
        return Ok("No items to give away".to_string());
    };
    let item = ctx
        .chooser
        .item_to_give(giver)
        .filter(|i| giver.items.contains(i))
        .unwrap_or(first);
    let others = ctx.others(actor);
    let Some(target) = choose_target(ctx, TargetPurpose::GiveItem, &others) else {
        return Ok("Nobody to give an item to".to_string());
    };
    ctx.player_mut(actor)?.take_item(item);
    ctx.player_mut(&target)?.items.push(item);
    Ok(format!("Gave {item} to {}", ctx.name_of(&target)?))
}

/// Counts down a pending Spin Again once a Bad outcome has settled.
fn consume_spin(ctx: &mut GameContext<'_>, actor: &PlayerId) -> Result<(), GameError> {
    let player = ctx.player_mut(actor)?;
    player.spins_remaining = match player.spins_remaining {
        Some(n) if n > 1 => Some(n - 1),
        _ => None,
    };
    Ok(())
}

fn resolve_shadow(
    ctx: &mut GameContext<'_>,
    actor: &PlayerId,
    name: &str,
    outcome: ShadowOutcome,
) -> Result<WheelResolution, GameError> {
    let line = match outcome {
        ShadowOutcome::ReturnHome => {
            let start = ctx.start_space();
            let player = ctx.player_mut(actor)?;
            player.position = start;
            player.shadow_turns = 0;
            "Returned to Start".to_string()
        }
        ShadowOutcome::InviteFriend => {
            let realm = ctx.shadow_realm()?;
            let free: Vec<PlayerId> = ctx
                .state
                .players
                .iter()
                .filter(|p| &p.id != actor && p.position != realm)
                .map(|p| p.id.clone())
                .collect();
            match choose_target(ctx, TargetPurpose::InviteFriend, &free) {
                Some(target) => {
                    ctx.banish(&target)?;
                    format!("Invited {} to Shadow Realm", ctx.name_of(&target)?)
                }
                None => "No friends to invite".to_string(),
            }
        }
        ShadowOutcome::LoseOne => match ctx.take_gold(actor, 1)? {
            0 => "No gold to lose".to_string(),
            _ => "Lost 1 gold".to_string(),
        },
        ShadowOutcome::Nothing => "Nothing happened, remains in Shadow Realm".to_string(),
    };
    ctx.player_mut(actor)?.has_moved = true;
    ctx.log(format!("{name} spun Shadow wheel: {line}"));
    Ok(WheelResolution::Done)
}
