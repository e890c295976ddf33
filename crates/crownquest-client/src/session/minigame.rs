//! Driving a minigame from `minigameStart` to the reward.

use std::time::Duration;

use crownquest_game::minigame::{ClashStage, MinigameMove, MinigameState, apply_reward};
use crownquest_protocol::{ClientEvent, CombatResult, PlayerId};
use tokio::sync::mpsc;
use tokio::time::{self, Instant};

use super::ClientSession;
use crate::{MinigameTiming, SyncError};

/// How a minigame ended for this client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinigameOutcome {
    pub winner: PlayerId,
    pub combat: CombatResult,
    /// This client applied and published the combat reward.
    pub rewarded: bool,
}

impl ClientSession {
    /// Plays the running minigame until somebody wins.
    ///
    /// Local moves come from `moves`; peers' moves arrive as relayed
    /// states. In Triple Clash the first seat also settles each round and
    /// opens the next one on the configured delays. After the end screen
    /// the initiator applies the reward through [`act`](Self::act).
    pub async fn run_to_completion(
        &mut self,
        moves: &mut mpsc::Receiver<MinigameMove>,
        timing: &MinigameTiming,
    ) -> Result<MinigameOutcome, SyncError> {
        let me = self.player_id.clone().ok_or(SyncError::NotInRoom)?;
        if self.minigame.is_none() {
            return Err(SyncError::NoMinigame);
        }
        self.idle(timing.countdown).await?;

        let mut pending: Option<(Instant, MinigameMove)> = None;
        let mut moves_open = true;
        let winner = loop {
            let state = self.minigame.as_ref().ok_or(SyncError::NoMinigame)?.session.state();
            if let Some(winner) = state.phase().winner() {
                break winner.clone();
            }
            pending = reschedule(pending, automatic_step(state, &me, timing));
            let deadline = pending.map_or_else(Instant::now, |(at, _)| at);

            tokio::select! {
                biased;
                event = self.inbox.recv() => {
                    let event = event.ok_or(SyncError::Closed)?;
                    self.handle(event).await?;
                }
                _ = time::sleep_until(deadline), if pending.is_some() => {
                    if let Some((_, mv)) = pending.take() {
                        self.play(&me, mv)?;
                    }
                }
                mv = moves.recv(), if moves_open => match mv {
                    Some(mv) => self.play(&me, mv)?,
                    None => moves_open = false,
                },
            }
        };

        self.idle(timing.end_screen).await?;
        let finished = self.minigame.take().ok_or(SyncError::NoMinigame)?;
        let combat = finished.session.combat;
        let rewarded = finished.initiator;
        if rewarded {
            self.act(|ctx| apply_reward(ctx, combat, &winner))?;
        }
        tracing::info!(%winner, %combat, rewarded, "minigame finished");
        Ok(MinigameOutcome { winner, combat, rewarded })
    }

    /// Applies a local move and relays the new state. Illegal moves are
    /// logged and dropped.
    fn play(&mut self, me: &PlayerId, mv: MinigameMove) -> Result<(), SyncError> {
        let room_id = self.room()?;
        let active = self.minigame.as_mut().ok_or(SyncError::NoMinigame)?;
        if let Err(e) = active.session.play(me, mv) {
            tracing::warn!(error = %e, ?mv, "minigame move rejected");
            return Ok(());
        }
        let game_state = active.session.state().to_json()?;
        self.send(ClientEvent::MinigameUpdate { room_id, game_state })
    }
}

/// The move the first Triple Clash seat makes on its own, and after how
/// long.
fn automatic_step(
    state: &MinigameState,
    me: &PlayerId,
    timing: &MinigameTiming,
) -> Option<(Duration, MinigameMove)> {
    let MinigameState::TripleClash(game) = state else {
        return None;
    };
    if state.is_over() || game.players.first() != Some(me) {
        return None;
    }
    match game.stage {
        ClashStage::Betting if game.all_bets_in() => {
            Some((timing.result_display, MinigameMove::Resolve))
        }
        ClashStage::Betting => None,
        ClashStage::Resolved { .. } => Some((timing.next_round, MinigameMove::NextRound)),
    }
}

/// Keeps an already scheduled step's deadline if the same step is still due.
fn reschedule(
    pending: Option<(Instant, MinigameMove)>,
    step: Option<(Duration, MinigameMove)>,
) -> Option<(Instant, MinigameMove)> {
    match (pending, step) {
        (Some((at, held)), Some((_, due))) if held == due => Some((at, held)),
        (_, Some((delay, due))) => Some((Instant::now() + delay, due)),
        (_, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crownquest_protocol::MinigameKind;

    fn pid(id: &str) -> PlayerId {
        PlayerId::new(id)
    }

    fn clash() -> MinigameState {
        MinigameState::new(MinigameKind::TripleClash, vec![pid("a"), pid("b"), pid("c")]).unwrap()
    }

    #[test]
    fn test_automatic_step_only_for_first_seat() {
        let mut state = clash();
        for id in ["a", "b", "c"] {
            state.apply(&pid(id), MinigameMove::Bet { amount: 1 }).unwrap();
        }
        let timing = MinigameTiming::default();

        assert_eq!(
            automatic_step(&state, &pid("a"), &timing),
            Some((Duration::from_millis(500), MinigameMove::Resolve))
        );
        assert_eq!(automatic_step(&state, &pid("b"), &timing), None);
    }

    #[test]
    fn test_automatic_step_opens_next_round_after_resolve() {
        let mut state = clash();
        for id in ["a", "b", "c"] {
            state.apply(&pid(id), MinigameMove::Bet { amount: 0 }).unwrap();
        }
        state.apply(&pid("a"), MinigameMove::Resolve).unwrap();

        assert_eq!(
            automatic_step(&state, &pid("a"), &MinigameTiming::default()),
            Some((Duration::from_secs(3), MinigameMove::NextRound))
        );
    }

    #[test]
    fn test_automatic_step_waits_for_bets_and_ignores_turn_games() {
        let timing = MinigameTiming::default();
        assert_eq!(automatic_step(&clash(), &pid("a"), &timing), None);

        let grid = MinigameState::new(MinigameKind::GridCapture, vec![pid("a"), pid("b")]).unwrap();
        assert_eq!(automatic_step(&grid, &pid("a"), &timing), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_keeps_deadline_for_same_step() {
        let first = reschedule(None, Some((Duration::from_secs(3), MinigameMove::NextRound)));
        time::advance(Duration::from_secs(1)).await;
        let again = reschedule(first, Some((Duration::from_secs(3), MinigameMove::NextRound)));
        assert_eq!(first, again);

        let replaced = reschedule(again, Some((Duration::from_millis(500), MinigameMove::Resolve)));
        assert_eq!(replaced.map(|(_, mv)| mv), Some(MinigameMove::Resolve));
        assert_eq!(reschedule(replaced, None), None);
    }
}
