//! Room actor: an isolated Tokio task that owns one room's snapshot.
//!
//! Each room runs in its own task, communicating with the outside world
//! through an mpsc channel. Commands are handled one at a time in arrival
//! order, which is what makes last-write-wins well defined.

use std::collections::HashMap;

use crownquest_protocol::{
    CombatResult, Grid, MinigameKind, Player, PlayerId, Recipient, RoomId, RoomSnapshot,
    ServerEvent, StatePatch,
};
use rand::seq::SliceRandom;
use tokio::sync::{mpsc, oneshot};

use crate::merge;
use crate::{RoomConfig, RoomError, RoomPhase};

/// Channel delivering room events to one player's connection handler.
pub type MemberSender = mpsc::UnboundedSender<ServerEvent>;

/// Commands sent to a room actor through its channel.
///
/// Variants carrying a `oneshot::Sender` expect a reply; the rest are
/// fire-and-forget broadcasts.
pub(crate) enum RoomCommand {
    Join {
        name: String,
        sender: MemberSender,
        reply: oneshot::Sender<Result<JoinOutcome, RoomError>>,
    },
    Leave {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<LeaveOutcome, RoomError>>,
    },
    Update {
        patch: StatePatch,
        reply: oneshot::Sender<Result<u64, RoomError>>,
    },
    Log {
        message: String,
    },
    GameOver {
        reason: String,
    },
    StartMinigame {
        combat_result: CombatResult,
        game_type: MinigameKind,
    },
    MinigameUpdate {
        game_state: serde_json::Value,
    },
    Snapshot {
        reply: oneshot::Sender<RoomSnapshot>,
    },
    Grid {
        reply: oneshot::Sender<Grid>,
    },
    Info {
        reply: oneshot::Sender<RoomInfo>,
    },
    Shutdown,
}

/// Result of a successful join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub player_id: PlayerId,
    pub memory_mode: bool,
    pub random_start_space: bool,
    /// The name matched a seated player; their old id was handed back.
    pub reconnected: bool,
}

/// Result of a successful leave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveOutcome {
    /// Players still seated. Zero means the room should be deleted.
    pub remaining: usize,
}

/// Room metadata (not the snapshot itself).
#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub phase: RoomPhase,
    pub player_count: usize,
    pub max_players: usize,
    pub version: u64,
}

/// Handle to a running room actor. Used to send commands to it.
///
/// Cheap to clone: it's just an `mpsc::Sender` wrapper. The repository
/// holds one of these per room.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    fn unavailable(&self) -> RoomError {
        RoomError::Unavailable(self.room_id.clone())
    }

    async fn send(&self, cmd: RoomCommand) -> Result<(), RoomError> {
        self.sender.send(cmd).await.map_err(|_| self.unavailable())
    }

    async fn request<T>(
        &self,
        cmd: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(cmd(reply_tx)).await?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    /// Seats a new player, or hands a returning player their old id.
    pub async fn join(
        &self,
        name: impl Into<String>,
        sender: MemberSender,
    ) -> Result<JoinOutcome, RoomError> {
        let name = name.into();
        self.request(|reply| RoomCommand::Join { name, sender, reply })
            .await?
    }

    pub async fn leave(&self, player_id: PlayerId) -> Result<LeaveOutcome, RoomError> {
        self.request(|reply| RoomCommand::Leave { player_id, reply })
            .await?
    }

    /// Merges a client update and rebroadcasts. Returns the new version.
    pub async fn update(&self, patch: StatePatch) -> Result<u64, RoomError> {
        self.request(|reply| RoomCommand::Update { patch, reply })
            .await?
    }

    pub async fn log(&self, message: String) -> Result<(), RoomError> {
        self.send(RoomCommand::Log { message }).await
    }

    pub async fn game_over(&self, reason: String) -> Result<(), RoomError> {
        self.send(RoomCommand::GameOver { reason }).await
    }

    pub async fn start_minigame(
        &self,
        combat_result: CombatResult,
        game_type: MinigameKind,
    ) -> Result<(), RoomError> {
        self.send(RoomCommand::StartMinigame { combat_result, game_type })
            .await
    }

    pub async fn minigame_update(&self, game_state: serde_json::Value) -> Result<(), RoomError> {
        self.send(RoomCommand::MinigameUpdate { game_state }).await
    }

    pub async fn snapshot(&self) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::Snapshot { reply }).await
    }

    pub async fn grid(&self) -> Result<Grid, RoomError> {
        self.request(|reply| RoomCommand::Grid { reply }).await
    }

    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        self.request(|reply| RoomCommand::Info { reply }).await
    }

    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.send(RoomCommand::Shutdown).await
    }
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor {
    room_id: RoomId,
    config: RoomConfig,
    snapshot: RoomSnapshot,
    grid: Grid,
    /// Last relayed minigame state. Opaque to the server.
    minigame: Option<serde_json::Value>,
    /// Per-player outbound channels. A reconnect replaces the entry.
    senders: HashMap<PlayerId, MemberSender>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    /// Runs the actor loop, processing commands until shutdown.
    async fn run(mut self) {
        tracing::info!(room_id = %self.room_id, "room actor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                RoomCommand::Join { name, sender, reply } => {
                    let _ = reply.send(self.handle_join(name, sender));
                }
                RoomCommand::Leave { player_id, reply } => {
                    let _ = reply.send(self.handle_leave(player_id));
                }
                RoomCommand::Update { patch, reply } => {
                    let _ = reply.send(self.handle_update(patch));
                }
                RoomCommand::Log { message } => {
                    self.snapshot.log.push(message.clone());
                    self.snapshot.version += 1;
                    self.dispatch(Recipient::All, ServerEvent::Log { message });
                }
                RoomCommand::GameOver { reason } => {
                    tracing::info!(room_id = %self.room_id, %reason, "game over");
                    self.snapshot.game_over = true;
                    self.snapshot.version += 1;
                    self.dispatch(Recipient::All, ServerEvent::GameOver { reason });
                }
                RoomCommand::StartMinigame { combat_result, game_type } => {
                    tracing::info!(
                        room_id = %self.room_id,
                        %combat_result,
                        ?game_type,
                        "minigame started"
                    );
                    self.minigame = None;
                    self.dispatch(
                        Recipient::All,
                        ServerEvent::MinigameStart { combat_result, game_type },
                    );
                }
                RoomCommand::MinigameUpdate { game_state } => {
                    tracing::debug!(room_id = %self.room_id, "minigame state relayed");
                    self.minigame = Some(game_state.clone());
                    self.dispatch(
                        Recipient::All,
                        ServerEvent::MinigameStateUpdate { game_state },
                    );
                }
                RoomCommand::Snapshot { reply } => {
                    let _ = reply.send(self.snapshot.clone());
                }
                RoomCommand::Grid { reply } => {
                    let _ = reply.send(self.grid.clone());
                }
                RoomCommand::Info { reply } => {
                    let _ = reply.send(self.info());
                }
                RoomCommand::Shutdown => {
                    tracing::info!(room_id = %self.room_id, "room shutting down");
                    break;
                }
            }
        }

        tracing::info!(room_id = %self.room_id, "room actor stopped");
    }

    fn handle_join(&mut self, name: String, sender: MemberSender) -> Result<JoinOutcome, RoomError> {
        if let Some(existing) = self.snapshot.player_named(&name) {
            let player_id = existing.id.clone();
            tracing::info!(room_id = %self.room_id, %player_id, "player reconnected");
            self.senders.insert(player_id.clone(), sender);
            self.welcome(&player_id);
            if self.snapshot.init_complete {
                self.send_to(&player_id, self.init_complete());
            }
            if let Some(game_state) = self.minigame.clone() {
                self.send_to(&player_id, ServerEvent::MinigameStateUpdate { game_state });
            }
            return Ok(self.outcome(player_id, true));
        }

        if self.snapshot.players.len() >= self.config.max_players {
            return Err(RoomError::RoomFull(self.room_id.clone()));
        }

        let player_id = self.fresh_player_id();
        self.snapshot.players.push(Player::new(
            player_id.clone(),
            name.clone(),
            self.config.starting_gold,
            self.snapshot.start_space_id,
        ));
        // A seat freed mid-game: the newcomer takes the last turn slot.
        let mid_game = self.snapshot.init_complete;
        if mid_game {
            self.snapshot.turn_order.push(player_id.clone());
            if self.snapshot.current_player.is_none() {
                self.snapshot.current_player = self.snapshot.turn_order.first().cloned();
            }
        }
        self.snapshot.version += 1;
        self.senders.insert(player_id.clone(), sender);
        tracing::info!(
            room_id = %self.room_id,
            %player_id,
            players = self.snapshot.players.len(),
            mid_game,
            "player joined"
        );

        self.dispatch(
            Recipient::All,
            ServerEvent::Log { message: format!("{name} has joined the quest") },
        );
        self.welcome(&player_id);

        if mid_game {
            self.send_to(&player_id, self.init_complete());
            self.broadcast_state();
        } else if self.snapshot.players.len() == self.config.max_players {
            self.start_game();
        }

        Ok(self.outcome(player_id, false))
    }

    fn handle_leave(&mut self, player_id: PlayerId) -> Result<LeaveOutcome, RoomError> {
        let idx = self
            .snapshot
            .players
            .iter()
            .position(|p| p.id == player_id)
            .ok_or_else(|| RoomError::NotInRoom(player_id.clone(), self.room_id.clone()))?;
        let player = self.snapshot.players.remove(idx);

        self.dispatch(
            Recipient::All,
            ServerEvent::Log { message: format!("{} has left the quest", player.name) },
        );
        self.senders.remove(&player_id);

        let remaining = self.snapshot.players.len();
        tracing::info!(room_id = %self.room_id, %player_id, players = remaining, "player left");
        if remaining == 0 {
            return Ok(LeaveOutcome { remaining });
        }

        self.snapshot.turn_order.retain(|id| *id != player_id);
        if self.snapshot.current_player.as_ref() == Some(&player_id) {
            self.snapshot.current_player = self.snapshot.turn_order.first().cloned();
        }
        self.snapshot.version += 1;
        self.broadcast_state();
        Ok(LeaveOutcome { remaining })
    }

    fn handle_update(&mut self, patch: StatePatch) -> Result<u64, RoomError> {
        if self.config.reject_stale_updates {
            if let Err(e) = merge::check_base(&self.snapshot, &patch) {
                tracing::warn!(room_id = %self.room_id, error = %e, "stale update rejected");
                return Err(e);
            }
        }
        merge::apply_patch(&mut self.snapshot, patch);
        tracing::debug!(
            room_id = %self.room_id,
            version = self.snapshot.version,
            current_player = ?self.snapshot.current_player,
            "state updated"
        );
        self.broadcast_state();
        Ok(self.snapshot.version)
    }

    /// Fixes the turn order once the roster is complete. Runs once per room.
    fn start_game(&mut self) {
        let mut order: Vec<PlayerId> = self.snapshot.players.iter().map(|p| p.id.clone()).collect();
        order.shuffle(&mut rand::rng());
        self.snapshot.current_player = order.first().cloned();
        self.snapshot.turn_order = order;
        self.snapshot.init_complete = true;
        self.snapshot.version += 1;
        tracing::info!(
            room_id = %self.room_id,
            turn_order = ?self.snapshot.turn_order,
            "game initialized"
        );

        self.dispatch(Recipient::All, self.init_complete());
        self.broadcast_state();
    }

    /// `assignPlayerId` followed by the full snapshot, to one player.
    fn welcome(&self, player_id: &PlayerId) {
        self.send_to(player_id, ServerEvent::AssignPlayerId { player_id: player_id.clone() });
        self.send_to(player_id, ServerEvent::State { state: self.snapshot.clone() });
    }

    fn init_complete(&self) -> ServerEvent {
        ServerEvent::InitComplete {
            turn_order: self.snapshot.turn_order.clone(),
            current_player: self.snapshot.current_player.clone(),
        }
    }

    fn broadcast_state(&self) {
        self.dispatch(Recipient::All, ServerEvent::State { state: self.snapshot.clone() });
    }

    fn fresh_player_id(&self) -> PlayerId {
        let mut rng = rand::rng();
        loop {
            let id = PlayerId::random(&mut rng);
            if self.snapshot.player(&id).is_none() {
                return id;
            }
        }
    }

    fn outcome(&self, player_id: PlayerId, reconnected: bool) -> JoinOutcome {
        JoinOutcome {
            player_id,
            memory_mode: self.snapshot.memory_mode,
            random_start_space: self.snapshot.random_start_space,
            reconnected,
        }
    }

    fn dispatch(&self, recipient: Recipient, event: ServerEvent) {
        match recipient {
            Recipient::All => {
                for sender in self.senders.values() {
                    let _ = sender.send(event.clone());
                }
            }
            Recipient::Player(pid) => self.send_to(&pid, event),
        }
    }

    /// Sends to a single player. Silently drops if their handler is gone.
    fn send_to(&self, player_id: &PlayerId, event: ServerEvent) {
        if let Some(sender) = self.senders.get(player_id) {
            let _ = sender.send(event);
        }
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            room_id: self.room_id.clone(),
            phase: RoomPhase::of(&self.snapshot),
            player_count: self.snapshot.players.len(),
            max_players: self.config.max_players,
            version: self.snapshot.version,
        }
    }
}

/// Everything needed to open a room with its creator seated.
#[derive(Debug, Clone)]
pub struct NewRoom {
    pub room_id: RoomId,
    pub creator: Player,
    pub grid: Grid,
    pub memory_mode: bool,
    pub random_start_space: bool,
}

/// Spawns a room actor and greets the creator through `sender`.
pub(crate) fn spawn_room(new: NewRoom, config: RoomConfig, sender: MemberSender) -> RoomHandle {
    let (tx, rx) = mpsc::channel(config.channel_size);
    let NewRoom {
        room_id,
        creator,
        grid,
        memory_mode,
        random_start_space,
    } = new;

    let mut snapshot = RoomSnapshot::new(memory_mode, random_start_space, creator.position);
    let creator_id = creator.id.clone();
    snapshot.players.push(creator);

    let mut senders = HashMap::new();
    senders.insert(creator_id.clone(), sender);

    let actor = RoomActor {
        room_id: room_id.clone(),
        config,
        snapshot,
        grid,
        minigame: None,
        senders,
        receiver: rx,
    };
    actor.welcome(&creator_id);

    tokio::spawn(actor.run());

    RoomHandle { room_id, sender: tx }
}
