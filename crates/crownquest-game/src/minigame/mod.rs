//! Combat minigames.
//!
//! A Combat wheel spin announces `minigameStart` to the room. Every client
//! then builds the same initial [`MinigameState`] from the roster order
//! and plays it in lockstep: the client that makes a move applies it
//! locally and relays the full state; the others adopt what they receive.
//! The server never looks inside.
//!
//! Each game is a small state machine. Once its [`Phase`] is `Ended` it
//! rejects every further move, and a [`MinigameSession`] reports the end
//! to its owner exactly once.

mod area_control;
mod grid_capture;
mod triple_clash;

pub use area_control::{AREA_SIDE, AreaControl, Color};
pub use grid_capture::{GRID_SIDE, GridCapture, MAX_LIVE_PIECES, Mark, WINDOWS};
pub use triple_clash::{ClashStage, MAX_BET, RoundResult, STARTING_COINS, TripleClash};

use crownquest_protocol::{CombatResult, Gold, MinigameKind, PlayerId};
use serde::{Deserialize, Serialize};

use crate::{GameContext, GameError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MinigameError {
    #[error("minigame is over")]
    Finished,

    #[error("{0} is not playing this minigame")]
    NotParticipant(PlayerId),

    #[error("not your turn in the minigame")]
    NotYourTurn,

    #[error("cell {0} is off the board")]
    OutOfBounds(usize),

    #[error("cell {0} is already taken")]
    Occupied(usize),

    #[error("placing on cell {0} encloses nothing")]
    IllegalPlacement(usize),

    #[error("bet of {amount} is not allowed")]
    InvalidBet { amount: u32 },

    #[error("bet already submitted this round")]
    AlreadyBet,

    #[error("round already resolved")]
    AlreadyResolved,

    #[error("not every bet is in yet")]
    NotReady,

    #[error("{action} does not apply to {kind:?}")]
    WrongGame {
        action: &'static str,
        kind: MinigameKind,
    },

    #[error("a minigame needs at least two players")]
    TooFewPlayers,
}

// ---------------------------------------------------------------------------
// Shared types
// ---------------------------------------------------------------------------

/// Lifecycle of a single minigame. `Ended` is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Phase {
    Active,
    Ended { winner: PlayerId },
}

impl Phase {
    pub fn winner(&self) -> Option<&PlayerId> {
        match self {
            Self::Active => None,
            Self::Ended { winner } => Some(winner),
        }
    }
}

/// One player input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinigameMove {
    /// Put a piece on `cell` (grid capture and area control).
    Place { cell: usize },
    /// Skip the turn (area control).
    Pass,
    /// Sealed bet for this round (Triple Clash).
    Bet { amount: u32 },
    /// Settle a round once every bet is in (Triple Clash).
    Resolve,
    /// Clear bets and open the next round (Triple Clash).
    NextRound,
}

impl MinigameMove {
    fn name(self) -> &'static str {
        match self {
            Self::Place { .. } => "place",
            Self::Pass => "pass",
            Self::Bet { .. } => "bet",
            Self::Resolve => "resolve",
            Self::NextRound => "next round",
        }
    }
}

/// Index of `id` among `players`.
pub(crate) fn seat_of(players: &[PlayerId], id: &PlayerId) -> Result<usize, MinigameError> {
    players
        .iter()
        .position(|p| p == id)
        .ok_or_else(|| MinigameError::NotParticipant(id.clone()))
}

/// Index of the first maximum; ties go to the lowest index.
pub(crate) fn first_max(scores: &[u32]) -> usize {
    let mut best = 0;
    for (i, score) in scores.iter().enumerate() {
        if *score > scores[best] {
            best = i;
        }
    }
    best
}

// ---------------------------------------------------------------------------
// MinigameState
// ---------------------------------------------------------------------------

/// The relayed state of whichever minigame is running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MinigameState {
    #[serde(rename = "tictactoe")]
    GridCapture(GridCapture),
    #[serde(rename = "reversi")]
    AreaControl(AreaControl),
    #[serde(rename = "coinclash")]
    TripleClash(TripleClash),
}

impl MinigameState {
    /// Fresh game; `players` is the seating order.
    pub fn new(kind: MinigameKind, players: Vec<PlayerId>) -> Result<Self, MinigameError> {
        if players.len() < 2 {
            return Err(MinigameError::TooFewPlayers);
        }
        Ok(match kind {
            MinigameKind::GridCapture => Self::GridCapture(GridCapture::new(players)),
            MinigameKind::AreaControl => Self::AreaControl(AreaControl::new(players)),
            MinigameKind::TripleClash => Self::TripleClash(TripleClash::new(players)),
        })
    }

    pub fn kind(&self) -> MinigameKind {
        match self {
            Self::GridCapture(_) => MinigameKind::GridCapture,
            Self::AreaControl(_) => MinigameKind::AreaControl,
            Self::TripleClash(_) => MinigameKind::TripleClash,
        }
    }

    /// Seating order.
    pub fn players(&self) -> &[PlayerId] {
        match self {
            Self::GridCapture(g) => &g.players,
            Self::AreaControl(g) => &g.players,
            Self::TripleClash(g) => &g.players,
        }
    }

    pub fn phase(&self) -> &Phase {
        match self {
            Self::GridCapture(g) => &g.phase,
            Self::AreaControl(g) => &g.phase,
            Self::TripleClash(g) => &g.phase,
        }
    }

    pub fn is_over(&self) -> bool {
        matches!(self.phase(), Phase::Ended { .. })
    }

    /// Whose move it is; `None` for simultaneous games or once ended.
    pub fn to_move(&self) -> Option<&PlayerId> {
        if self.is_over() {
            return None;
        }
        match self {
            Self::GridCapture(g) => g.players.get(g.current),
            Self::AreaControl(g) => g.players.get(g.current),
            Self::TripleClash(_) => None,
        }
    }

    /// Applies one move. A rejected move leaves the state untouched.
    pub fn apply(&mut self, actor: &PlayerId, mv: MinigameMove) -> Result<(), MinigameError> {
        if self.is_over() {
            return Err(MinigameError::Finished);
        }
        let kind = self.kind();
        let wrong = || MinigameError::WrongGame { action: mv.name(), kind };
        match (self, mv) {
            (Self::GridCapture(g), MinigameMove::Place { cell }) => g.place(actor, cell),
            (Self::AreaControl(g), MinigameMove::Place { cell }) => g.place(actor, cell),
            (Self::AreaControl(g), MinigameMove::Pass) => g.pass(actor),
            (Self::TripleClash(g), MinigameMove::Bet { amount }) => g.bet(actor, amount),
            (Self::TripleClash(g), MinigameMove::Resolve) => g.resolve().map(|_| ()),
            (Self::TripleClash(g), MinigameMove::NextRound) => g.next_round(),
            _ => Err(wrong()),
        }
    }

    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Parses a relayed state, rejecting one whose per-seat tables do not
    /// match its roster.
    pub fn from_json(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        let state: Self = serde_json::from_value(value)?;
        let consistent = state.players().len() >= 2
            && match &state {
                Self::GridCapture(g) => g.is_consistent(),
                Self::AreaControl(g) => g.is_consistent(),
                Self::TripleClash(g) => g.is_consistent(),
            };
        if !consistent {
            return Err(serde::de::Error::custom("inconsistent minigame state"));
        }
        Ok(state)
    }
}

// ---------------------------------------------------------------------------
// MinigameSession
// ---------------------------------------------------------------------------

/// One client's view of a running minigame, plus the combat result that
/// decides the reward.
#[derive(Debug, Clone)]
pub struct MinigameSession {
    pub combat: CombatResult,
    state: MinigameState,
    end_screen_shown: bool,
}

impl MinigameSession {
    pub fn new(combat: CombatResult, state: MinigameState) -> Self {
        Self { combat, state, end_screen_shown: false }
    }

    pub fn state(&self) -> &MinigameState {
        &self.state
    }

    /// Applies a local move. Returns the winner if this move ended the game.
    pub fn play(
        &mut self,
        actor: &PlayerId,
        mv: MinigameMove,
    ) -> Result<Option<PlayerId>, MinigameError> {
        self.state.apply(actor, mv)?;
        Ok(self.take_end())
    }

    /// Adopts a relayed state. Returns the winner the first time an ended
    /// state is seen; later copies of the end are ignored.
    pub fn observe(&mut self, incoming: MinigameState) -> Option<PlayerId> {
        if self.end_screen_shown {
            return None;
        }
        self.state = keep_sealed_bets(&self.state, incoming);
        self.take_end()
    }

    fn take_end(&mut self) -> Option<PlayerId> {
        if self.end_screen_shown {
            return None;
        }
        let winner = self.state.phase().winner().cloned()?;
        self.end_screen_shown = true;
        Some(winner)
    }
}

/// Triple Clash bets arrive concurrently, so a relayed state can lack a
/// bet this client already holds for the same round.
fn keep_sealed_bets(local: &MinigameState, mut incoming: MinigameState) -> MinigameState {
    if let (MinigameState::TripleClash(mine), MinigameState::TripleClash(theirs)) =
        (local, &mut incoming)
    {
        let same_round = mine.round == theirs.round
            && mine.stage == ClashStage::Betting
            && theirs.stage == ClashStage::Betting
            && mine.players == theirs.players;
        if same_round {
            for (slot, held) in theirs.bets.iter_mut().zip(&mine.bets) {
                if slot.is_none() {
                    *slot = *held;
                }
            }
        }
    }
    incoming
}

// ---------------------------------------------------------------------------
// Rewards
// ---------------------------------------------------------------------------

/// Most gold the winner takes from each loser on a Steal.
pub const STEAL_AMOUNT: Gold = 2;

/// Pays out a finished minigame according to the Combat result.
pub fn apply_reward(
    ctx: &mut GameContext<'_>,
    combat: CombatResult,
    winner: &PlayerId,
) -> Result<(), GameError> {
    let name = ctx.name_of(winner)?;
    let losers = ctx.others(winner);
    match combat {
        CombatResult::Steal => {
            let mut haul = 0;
            for loser in &losers {
                let player = ctx.player_mut(loser)?;
                let taken = STEAL_AMOUNT.min(player.gold.max(0));
                player.gold -= taken;
                haul += taken;
            }
            ctx.player_mut(winner)?.gold += haul;
            ctx.log(format!(
                "Combat: {name} won the mini-game and stole 2 gold from each opponent!"
            ));
        }
        CombatResult::Shadow => {
            for loser in &losers {
                ctx.banish(loser)?;
            }
            ctx.log(format!(
                "Combat: {name} won the mini-game! Other players sent to Shadow Realm."
            ));
        }
        CombatResult::Truce => {
            ctx.player_mut(winner)?.gold += 3;
            for loser in &losers {
                ctx.player_mut(loser)?.gold += 1;
            }
            ctx.log(format!(
                "Combat: {name} won the mini-game and gained 3 gold! Others gained 1 gold."
            ));
        }
        CombatResult::NoEffect => {
            ctx.player_mut(winner)?.gold += 2;
            ctx.log(format!("Combat: {name} won the mini-game and gained 2 gold."));
        }
    }
    tracing::info!(%winner, %combat, "minigame reward applied");
    Ok(())
}
