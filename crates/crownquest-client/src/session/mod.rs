//! `ClientSession`: one player's mirror of one room.
//!
//! The session owns both halves of the conversation with the relay: an
//! outbox of [`ClientEvent`]s and an inbox of [`ServerEvent`]s. It is
//! driven by a single task. Game rules run against a draft of the local
//! snapshot through [`ClientSession::act`]; when a rule succeeds the whole
//! draft is published with `update` and becomes the new mirror.

mod escape;
mod minigame;

use std::time::Duration;

use crownquest_game::minigame::{MinigameSession, MinigameState};
use crownquest_game::{Chooser, FirstChoice, GameContext, GameError};
use crownquest_protocol::{
    AckResult, ClientEvent, CombatResult, Grid, MinigameKind, PlayerId, RoomId, RoomSnapshot,
    ServerEvent, Space, StatePatch,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::sync::{SnapshotCheck, SyncTracker, check_snapshot, has_duplicates};
use crate::{SyncConfig, SyncError};

pub use minigame::MinigameOutcome;

/// What handling one server event changed, for the caller's UI.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// Our `create` or `join` was accepted.
    Joined { room_id: RoomId, player_id: PlayerId },
    RoomCreated(RoomId),
    Left,
    /// The server refused a request.
    Rejected(String),
    PlayerAssigned(PlayerId),
    /// The mirror was replaced by a consistent snapshot.
    State,
    /// The snapshot disagreed with us and `requestState` went out again.
    Resyncing { attempt: u32 },
    Started {
        turn_order: Vec<PlayerId>,
        current_player: Option<PlayerId>,
    },
    Log(String),
    GameOver(String),
    ServerError(String),
    MinigameStarted { combat: CombatResult, kind: MinigameKind },
    MinigameUpdated,
    MinigameEnded { winner: PlayerId },
    /// Nothing to do with this event in the current state.
    Ignored,
}

/// Body of `/api/grid`.
#[derive(Debug, Deserialize)]
struct GridPayload {
    spaces: Vec<Space>,
    hash: String,
}

struct ActiveMinigame {
    session: MinigameSession,
    /// This client asked for the minigame and pays out the reward.
    initiator: bool,
}

pub struct ClientSession {
    outbox: mpsc::UnboundedSender<ClientEvent>,
    inbox: mpsc::UnboundedReceiver<ServerEvent>,
    tracker: SyncTracker,
    room_id: Option<RoomId>,
    player_id: Option<PlayerId>,
    state: Option<RoomSnapshot>,
    grid: Option<Grid>,
    minigame: Option<ActiveMinigame>,
    /// Between our `startMinigame` and the server's `minigameStart`.
    starting: bool,
    rng: StdRng,
    chooser: Box<dyn Chooser + Send>,
}

impl ClientSession {
    pub fn new(
        outbox: mpsc::UnboundedSender<ClientEvent>,
        inbox: mpsc::UnboundedReceiver<ServerEvent>,
        config: SyncConfig,
    ) -> Self {
        Self {
            outbox,
            inbox,
            tracker: SyncTracker::new(config),
            room_id: None,
            player_id: None,
            state: None,
            grid: None,
            minigame: None,
            starting: false,
            rng: StdRng::from_os_rng(),
            chooser: Box::new(FirstChoice),
        }
    }

    /// Replaces the random source, e.g. with a seeded one.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Replaces the policy that answers player decisions.
    pub fn with_chooser(mut self, chooser: impl Chooser + Send + 'static) -> Self {
        self.chooser = Box::new(chooser);
        self
    }

    pub fn room_id(&self) -> Option<&RoomId> {
        self.room_id.as_ref()
    }

    pub fn player_id(&self) -> Option<&PlayerId> {
        self.player_id.as_ref()
    }

    pub fn state(&self) -> Option<&RoomSnapshot> {
        self.state.as_ref()
    }

    pub fn grid(&self) -> Option<&Grid> {
        self.grid.as_ref()
    }

    pub fn minigame(&self) -> Option<&MinigameSession> {
        self.minigame.as_ref().map(|m| &m.session)
    }

    pub fn resync_attempts(&self) -> u32 {
        self.tracker.attempts()
    }

    /// It is this client's turn.
    pub fn is_my_turn(&self) -> bool {
        match (&self.state, &self.player_id) {
            (Some(state), Some(me)) => state.is_current(me),
            _ => false,
        }
    }

    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    fn send(&self, event: ClientEvent) -> Result<(), SyncError> {
        tracing::trace!(event = event.name(), "sending");
        self.outbox.send(event).map_err(|_| SyncError::Closed)
    }

    fn room(&self) -> Result<RoomId, SyncError> {
        self.room_id.clone().ok_or(SyncError::NotInRoom)
    }

    pub fn create(
        &self,
        name: impl Into<String>,
        memory_mode: bool,
        random_start_space: bool,
    ) -> Result<(), SyncError> {
        self.send(ClientEvent::Create { name: name.into(), memory_mode, random_start_space })
    }

    pub fn join(&self, room_id: RoomId, name: impl Into<String>) -> Result<(), SyncError> {
        self.send(ClientEvent::Join { room_id, name: name.into() })
    }

    pub fn leave(&self) -> Result<(), SyncError> {
        self.send(ClientEvent::LeaveRoom { room_id: self.room()? })
    }

    pub fn request_state(&self) -> Result<(), SyncError> {
        self.send(ClientEvent::RequestState { room_id: self.room()? })
    }

    pub fn request_player_id(&self) -> Result<(), SyncError> {
        self.send(ClientEvent::RequestPlayerId { room_id: self.room()? })
    }

    pub fn init(&self) -> Result<(), SyncError> {
        self.send(ClientEvent::Init { room_id: self.room()? })
    }

    /// Sends a log line that is stored and broadcast as-is.
    pub fn log(&self, message: impl Into<String>) -> Result<(), SyncError> {
        self.send(ClientEvent::Log { room_id: self.room()?, message: message.into() })
    }

    pub fn game_over(&self, reason: impl Into<String>) -> Result<(), SyncError> {
        self.send(ClientEvent::GameOver { room_id: self.room()?, reason: reason.into() })
    }

    /// Announces a minigame. This client becomes its initiator.
    pub fn start_minigame(&mut self, combat: CombatResult, kind: MinigameKind) -> Result<(), SyncError> {
        self.send(ClientEvent::StartMinigame {
            room_id: self.room()?,
            combat_result: combat,
            game_type: kind,
        })?;
        self.starting = true;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Grid
    // -----------------------------------------------------------------------

    /// Installs a grid after checking it hashes to `expected_hash`.
    pub fn set_grid(&mut self, grid: Grid, expected_hash: &str) -> Result<(), SyncError> {
        grid.validate()?;
        let actual = grid.content_hash();
        if actual != expected_hash {
            tracing::error!(expected = expected_hash, %actual, "grid hash mismatch");
            return Err(SyncError::GridMismatch { expected: expected_hash.to_string(), actual });
        }
        self.grid = Some(grid);
        Ok(())
    }

    /// Installs the grid from an `/api/grid` response body.
    pub fn load_grid(&mut self, body: &[u8]) -> Result<(), SyncError> {
        let payload: GridPayload = serde_json::from_slice(body)?;
        self.set_grid(Grid { spaces: payload.spaces }, &payload.hash)
    }

    // -----------------------------------------------------------------------
    // Rules
    // -----------------------------------------------------------------------

    /// Runs `rule` on a draft of the mirror and publishes the result.
    ///
    /// A failing rule leaves the mirror untouched and sends nothing.
    pub fn act<T>(
        &mut self,
        rule: impl FnOnce(&mut GameContext<'_>) -> Result<T, GameError>,
    ) -> Result<T, SyncError> {
        let room_id = self.room()?;
        let grid = self.grid.as_ref().ok_or(SyncError::NoGrid)?;
        let mut draft = self.state.clone().ok_or(SyncError::NoState)?;

        let outcome = {
            let mut ctx = GameContext::new(&mut draft, grid, &mut self.rng, self.chooser.as_mut());
            rule(&mut ctx)
        };
        let value = outcome.inspect_err(|e| tracing::debug!(error = %e, "rule rejected"))?;

        self.send(ClientEvent::Update { room_id, state: StatePatch::from(&draft) })?;
        self.state = Some(draft);
        Ok(value)
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    /// Waits for the next server event and applies it.
    pub async fn next_notice(&mut self) -> Result<Notice, SyncError> {
        let event = self.inbox.recv().await.ok_or(SyncError::Closed)?;
        self.handle(event).await
    }

    /// Keeps handling server events until `period` has passed.
    async fn idle(&mut self, period: Duration) -> Result<(), SyncError> {
        let wake = Instant::now() + period;
        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(wake) => return Ok(()),
                event = self.inbox.recv() => {
                    let event = event.ok_or(SyncError::Closed)?;
                    self.handle(event).await?;
                }
            }
        }
    }

    /// Applies one server event to the mirror.
    pub async fn handle(&mut self, event: ServerEvent) -> Result<Notice, SyncError> {
        match event {
            ServerEvent::Ack { result, .. } => Ok(self.acknowledged(result)),
            ServerEvent::RoomCreated { room_id } => {
                self.room_id.get_or_insert_with(|| room_id.clone());
                Ok(Notice::RoomCreated(room_id))
            }
            ServerEvent::AssignPlayerId { player_id } => {
                self.player_id = Some(player_id.clone());
                Ok(Notice::PlayerAssigned(player_id))
            }
            ServerEvent::State { state } => self.adopt(state).await,
            ServerEvent::InitComplete { turn_order, current_player } => {
                if has_duplicates(&turn_order) {
                    return Err(SyncError::TurnOrderCorrupted);
                }
                if let Some(state) = self.state.as_mut() {
                    state.turn_order = turn_order.clone();
                    state.current_player = current_player.clone();
                    state.init_complete = true;
                }
                Ok(Notice::Started { turn_order, current_player })
            }
            ServerEvent::Log { message } => {
                if let Some(state) = self.state.as_mut() {
                    state.log.push(message.clone());
                }
                Ok(Notice::Log(message))
            }
            ServerEvent::GameOver { reason } => {
                if let Some(state) = self.state.as_mut() {
                    state.game_over = true;
                }
                Ok(Notice::GameOver(reason))
            }
            ServerEvent::Error { message } => {
                tracing::warn!(%message, "server reported an error");
                Ok(Notice::ServerError(message))
            }
            ServerEvent::MinigameStart { combat_result, game_type } => {
                self.begin_minigame(combat_result, game_type)
            }
            ServerEvent::MinigameStateUpdate { game_state } => Ok(self.observe_minigame(game_state)),
        }
    }

    fn acknowledged(&mut self, result: AckResult) -> Notice {
        match result {
            AckResult::Created { room_id, player_id, .. } | AckResult::Joined { room_id, player_id, .. } => {
                tracing::info!(%room_id, %player_id, "seated");
                self.room_id = Some(room_id.clone());
                self.player_id = Some(player_id.clone());
                Notice::Joined { room_id, player_id }
            }
            AckResult::Left { success: true } => {
                self.room_id = None;
                self.player_id = None;
                self.state = None;
                self.minigame = None;
                self.tracker.converged();
                Notice::Left
            }
            AckResult::Left { success: false } => Notice::Rejected("leave refused".into()),
            AckResult::Failed { error } => {
                tracing::warn!(%error, "request refused");
                Notice::Rejected(error)
            }
        }
    }

    async fn adopt(&mut self, state: RoomSnapshot) -> Result<Notice, SyncError> {
        if self.room_id.is_none() {
            return Ok(Notice::Ignored);
        }
        let check = match &self.player_id {
            Some(me) => check_snapshot(&state, me)?,
            None => SnapshotCheck::Consistent,
        };
        self.state = Some(state);

        match check {
            SnapshotCheck::Consistent => {
                self.tracker.converged();
                Ok(Notice::State)
            }
            SnapshotCheck::Diverged(reason) => {
                let delay = self.tracker.diverged()?;
                tracing::warn!(reason, attempt = self.tracker.attempts(), "state diverged, resyncing");
                tokio::time::sleep(delay).await;
                self.request_state()?;
                Ok(Notice::Resyncing { attempt: self.tracker.attempts() })
            }
        }
    }

    fn begin_minigame(&mut self, combat: CombatResult, kind: MinigameKind) -> Result<Notice, SyncError> {
        let seats = self
            .state
            .as_ref()
            .map(|s| s.turn_order.clone())
            .ok_or(SyncError::NoState)?;
        let initiator = std::mem::take(&mut self.starting);
        let state = MinigameState::new(kind, seats)?;
        tracing::info!(%combat, ?kind, initiator, "minigame starting");
        self.minigame = Some(ActiveMinigame { session: MinigameSession::new(combat, state), initiator });
        Ok(Notice::MinigameStarted { combat, kind })
    }

    fn observe_minigame(&mut self, game_state: serde_json::Value) -> Notice {
        let incoming = match MinigameState::from_json(game_state) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed minigame state");
                return Notice::Ignored;
            }
        };
        let active = self.minigame.get_or_insert_with(|| {
            // Replayed after a reconnect. The combat result is not known
            // here, but only the initiator pays out.
            tracing::debug!("adopting replayed minigame state");
            ActiveMinigame {
                session: MinigameSession::new(CombatResult::NoEffect, incoming.clone()),
                initiator: false,
            }
        });
        match active.session.observe(incoming) {
            Some(winner) => Notice::MinigameEnded { winner },
            None => Notice::MinigameUpdated,
        }
    }
}
