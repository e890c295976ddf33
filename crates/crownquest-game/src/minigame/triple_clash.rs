//! Triple Clash: simultaneous sealed bets.
//!
//! Everyone starts with five coins and secretly bets 0 to 3 each round.
//! The unique highest bidder wins the round and pays the bet; if the top
//! bid is tied, every tied bidder pays and nobody wins. The match ends
//! when all coins are spent.

use crownquest_protocol::PlayerId;
use serde::{Deserialize, Serialize};

use super::{MinigameError, Phase, first_max, seat_of};

pub const STARTING_COINS: u32 = 5;
pub const MAX_BET: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RoundResult {
    Won { winner: PlayerId, bet: u32 },
    Tied { players: Vec<PlayerId>, bet: u32 },
}

impl RoundResult {
    /// One-line summary for the game log.
    pub fn describe(&self, name_of: impl Fn(&PlayerId) -> String) -> String {
        match self {
            Self::Won { winner, bet } => format!(
                "{} bet {bet} and wins the round! (loses {bet} coins)",
                name_of(winner)
            ),
            Self::Tied { players, bet } => {
                let names: Vec<String> = players.iter().map(&name_of).collect();
                format!(
                    "Tie! {} all bet {bet} and lose {bet} coins. No one wins this round.",
                    names.join(", ")
                )
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "camelCase")]
pub enum ClashStage {
    Betting,
    Resolved { result: RoundResult },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripleClash {
    pub players: Vec<PlayerId>,
    pub coins: Vec<u32>,
    pub rounds_won: Vec<u32>,
    pub round: u32,
    /// Sealed bets by seat; `None` until submitted.
    pub bets: Vec<Option<u32>>,
    pub stage: ClashStage,
    pub phase: Phase,
}

impl TripleClash {
    pub fn new(players: Vec<PlayerId>) -> Self {
        let n = players.len();
        Self {
            players,
            coins: vec![STARTING_COINS; n],
            rounds_won: vec![0; n],
            round: 1,
            bets: vec![None; n],
            stage: ClashStage::Betting,
            phase: Phase::Active,
        }
    }

    pub(super) fn is_consistent(&self) -> bool {
        let n = self.players.len();
        self.coins.len() == n && self.rounds_won.len() == n && self.bets.len() == n
    }

    pub fn all_bets_in(&self) -> bool {
        self.bets.iter().all(Option::is_some)
    }

    pub(super) fn bet(&mut self, actor: &PlayerId, amount: u32) -> Result<(), MinigameError> {
        let seat = seat_of(&self.players, actor)?;
        if self.stage != ClashStage::Betting {
            return Err(MinigameError::AlreadyResolved);
        }
        if self.bets[seat].is_some() {
            return Err(MinigameError::AlreadyBet);
        }
        if amount > MAX_BET || amount > self.coins[seat] {
            return Err(MinigameError::InvalidBet { amount });
        }
        self.bets[seat] = Some(amount);
        Ok(())
    }

    /// Settles the round once every bet is in.
    pub(super) fn resolve(&mut self) -> Result<RoundResult, MinigameError> {
        if self.stage != ClashStage::Betting {
            return Err(MinigameError::AlreadyResolved);
        }
        let bets: Vec<u32> = self
            .bets
            .iter()
            .map(|b| b.ok_or(MinigameError::NotReady))
            .collect::<Result<_, _>>()?;

        let top = bets.iter().copied().max().unwrap_or(0);
        let high: Vec<usize> = (0..bets.len()).filter(|&i| bets[i] == top).collect();
        for &seat in &high {
            self.coins[seat] = self.coins[seat].saturating_sub(top);
        }
        let result = match high.as_slice() {
            [only] => {
                self.rounds_won[*only] += 1;
                RoundResult::Won { winner: self.players[*only].clone(), bet: top }
            }
            _ => RoundResult::Tied {
                players: high.iter().map(|&i| self.players[i].clone()).collect(),
                bet: top,
            },
        };

        if self.coins.iter().all(|c| *c == 0) {
            let best = first_max(&self.rounds_won);
            self.phase = Phase::Ended { winner: self.players[best].clone() };
        }
        self.stage = ClashStage::Resolved { result: result.clone() };
        Ok(result)
    }

    pub(super) fn next_round(&mut self) -> Result<(), MinigameError> {
        if self.stage == ClashStage::Betting {
            return Err(MinigameError::NotReady);
        }
        self.round += 1;
        self.bets = vec![None; self.players.len()];
        self.stage = ClashStage::Betting;
        Ok(())
    }
}
