//! Per-connection handler: decode requests, drive rooms, push events.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Register a session for the connection
//!   2. Loop: forward queued room events, or receive the next envelope and
//!      dispatch it
//!   3. On exit, the session guard marks the connection gone and schedules
//!      the abandoned-room sweep

use std::sync::Arc;
use std::time::Instant;

use crownquest_protocol::{
    AckResult, ClientEvent, Codec, Envelope, Payload, PlayerId, RoomId, ServerEvent,
};
use crownquest_room::{CreateRoom, MemberSender, RoomError, RoomHandle};
use crownquest_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::sync::mpsc;

use crate::CrownQuestError;
use crate::server::ServerState;
use crate::tools::{GridGenerator, MapRenderer};

/// Drop guard that disconnects the session when the handler exits.
///
/// `Drop` is synchronous, so the async cleanup runs in a spawned task.
struct SessionGuard<G: GridGenerator, M: MapRenderer> {
    connection_id: ConnectionId,
    state: Arc<ServerState<G, M>>,
}

impl<G: GridGenerator, M: MapRenderer> Drop for SessionGuard<G, M> {
    fn drop(&mut self) {
        let connection_id = self.connection_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let (binding, grace) = {
                let mut sessions = state.sessions.lock().await;
                let grace = sessions.config().abandon_grace();
                (sessions.disconnect(connection_id).ok().flatten(), grace)
            };
            let Some(binding) = binding else { return };
            tracing::info!(
                %connection_id,
                room_id = %binding.room_id,
                player_id = %binding.player_id,
                "player disconnected, room kept for reconnection"
            );

            tokio::time::sleep(grace).await;
            sweep_abandoned_rooms::<G, M>(&state).await;
        });
    }
}

/// Deletes every room with no live session bound to it.
async fn sweep_abandoned_rooms<G: GridGenerator, M: MapRenderer>(state: &ServerState<G, M>) {
    let live = {
        let mut sessions = state.sessions.lock().await;
        sessions.expire_stale();
        sessions.cleanup_expired();
        sessions.live_rooms()
    };
    let removed = state
        .rooms
        .lock()
        .await
        .sweep_abandoned(&|room_id: &RoomId| live.contains(room_id))
        .await;
    if !removed.is_empty() {
        tracing::info!(rooms = ?removed, "abandoned rooms deleted");
    }
}

/// The room this connection currently acts in.
struct Membership {
    handle: RoomHandle,
    player_id: PlayerId,
}

/// Everything one connection carries between requests.
struct ConnectionContext {
    connection_id: ConnectionId,
    seq: u64,
    started: Instant,
    /// Handed to every room this connection creates or joins.
    events: MemberSender,
    membership: Option<Membership>,
}

impl ConnectionContext {
    fn new(connection_id: ConnectionId, events: MemberSender) -> Self {
        Self {
            connection_id,
            seq: 1,
            started: Instant::now(),
            events,
            membership: None,
        }
    }

    /// The membership's player if it is in `room_id`.
    fn player_in(&self, room_id: &RoomId) -> Option<&PlayerId> {
        self.membership
            .as_ref()
            .filter(|m| m.handle.room_id() == room_id)
            .map(|m| &m.player_id)
    }

    /// Sends one server event to this connection.
    async fn push<C: Codec>(
        &mut self,
        conn: &WebSocketConnection,
        codec: &C,
        event: ServerEvent,
    ) -> Result<(), CrownQuestError> {
        let envelope = Envelope::server(
            next_seq(&mut self.seq),
            self.started.elapsed().as_millis() as u64,
            event,
        );
        let bytes = codec.encode(&envelope)?;
        conn.send(&bytes).await?;
        Ok(())
    }

    async fn ack<C: Codec>(
        &mut self,
        conn: &WebSocketConnection,
        codec: &C,
        seq: u64,
        result: AckResult,
    ) -> Result<(), CrownQuestError> {
        self.push(conn, codec, ServerEvent::Ack { seq, result }).await
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<G: GridGenerator, M: MapRenderer>(
    conn: WebSocketConnection,
    state: Arc<ServerState<G, M>>,
) -> Result<(), CrownQuestError> {
    let connection_id = conn.id();
    tracing::debug!(%connection_id, peer = ?conn.peer_addr(), "handling new connection");

    state.sessions.lock().await.connect(connection_id)?;
    let _guard = SessionGuard {
        connection_id,
        state: Arc::clone(&state),
    };

    let shared: &ServerState<G, M> = &state;
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let mut ctx = ConnectionContext::new(connection_id, events_tx);
    let mut timeout = state.config.handshake_timeout;

    loop {
        tokio::select! {
            // Room events queued while a request was handled go out before
            // the next request is read, so an ack always precedes them.
            biased;

            Some(event) = events_rx.recv() => {
                ctx.push(&conn, &shared.codec, event).await?;
            }
            received = tokio::time::timeout(timeout, conn.recv()) => {
                let data = match received {
                    Ok(Ok(Some(data))) => data,
                    Ok(Ok(None)) => {
                        tracing::info!(%connection_id, "connection closed cleanly");
                        break;
                    }
                    Ok(Err(e)) => {
                        tracing::debug!(%connection_id, error = %e, "recv error");
                        break;
                    }
                    Err(_) => {
                        tracing::info!(%connection_id, "connection timed out");
                        break;
                    }
                };
                timeout = state.config.idle_timeout;

                let envelope: Envelope = match state.codec.decode(&data) {
                    Ok(env) => env,
                    Err(e) => {
                        tracing::warn!(%connection_id, error = %e, "failed to decode envelope");
                        ctx.push(&conn, &state.codec, ServerEvent::error("Malformed message")).await?;
                        continue;
                    }
                };

                match envelope.payload {
                    Payload::Client(event) => {
                        handle_client_event(&conn, shared, &mut ctx, envelope.seq, event).await?;
                    }
                    Payload::Server(_) => {
                        tracing::warn!(%connection_id, "client sent a server event");
                    }
                }
            }
        }
    }

    // _guard drops here → session disconnect fires.
    Ok(())
}

/// Dispatches one client request.
async fn handle_client_event<G: GridGenerator, M: MapRenderer>(
    conn: &WebSocketConnection,
    state: &ServerState<G, M>,
    ctx: &mut ConnectionContext,
    seq: u64,
    event: ClientEvent,
) -> Result<(), CrownQuestError> {
    tracing::debug!(connection_id = %ctx.connection_id, event = event.name(), "client event");

    match event {
        ClientEvent::Create { name, memory_mode, random_start_space } => {
            let result = create(state, ctx, name, memory_mode, random_start_space).await;
            let room_id = match &result {
                AckResult::Created { room_id, .. } => Some(room_id.clone()),
                _ => None,
            };
            ctx.ack(conn, &state.codec, seq, result).await?;
            if let Some(room_id) = room_id {
                ctx.push(conn, &state.codec, ServerEvent::RoomCreated { room_id }).await?;
            }
        }

        ClientEvent::Join { room_id, name } => {
            let result = join(state, ctx, room_id, name).await;
            ctx.ack(conn, &state.codec, seq, result).await?;
        }

        ClientEvent::LeaveRoom { room_id } => {
            let result = leave(state, ctx, &room_id).await;
            ctx.ack(conn, &state.codec, seq, result).await?;
        }

        ClientEvent::Update { room_id, state: patch } => {
            let outcome = match resolve_room(state, ctx, &room_id).await {
                Ok(handle) => handle.update(patch).await.map(drop),
                Err(e) => Err(e),
            };
            report(conn, state, ctx, outcome).await?;
        }

        ClientEvent::Log { room_id, message } => {
            let outcome = match resolve_room(state, ctx, &room_id).await {
                Ok(handle) => handle.log(message).await,
                Err(e) => Err(e),
            };
            report(conn, state, ctx, outcome).await?;
        }

        ClientEvent::GameOver { room_id, reason } => {
            let outcome = match resolve_room(state, ctx, &room_id).await {
                Ok(handle) => handle.game_over(reason).await,
                Err(e) => Err(e),
            };
            report(conn, state, ctx, outcome).await?;
        }

        ClientEvent::StartMinigame { room_id, combat_result, game_type } => {
            let outcome = match resolve_room(state, ctx, &room_id).await {
                Ok(handle) => handle.start_minigame(combat_result, game_type).await,
                Err(e) => Err(e),
            };
            report(conn, state, ctx, outcome).await?;
        }

        ClientEvent::MinigameUpdate { room_id, game_state } => {
            let outcome = match resolve_room(state, ctx, &room_id).await {
                Ok(handle) => handle.minigame_update(game_state).await,
                Err(e) => Err(e),
            };
            report(conn, state, ctx, outcome).await?;
        }

        ClientEvent::RequestState { room_id } => {
            let snapshot = match resolve_room(state, ctx, &room_id).await {
                Ok(handle) => handle.snapshot().await,
                Err(e) => Err(e),
            };
            match snapshot {
                Ok(snapshot) => {
                    let init = snapshot.init_complete.then(|| init_complete(&snapshot));
                    ctx.push(conn, &state.codec, ServerEvent::State { state: snapshot }).await?;
                    if let Some(init) = init {
                        ctx.push(conn, &state.codec, init).await?;
                    }
                }
                Err(e) => report(conn, state, ctx, Err(e)).await?,
            }
        }

        ClientEvent::Init { room_id } => {
            let snapshot = match resolve_room(state, ctx, &room_id).await {
                Ok(handle) => handle.snapshot().await,
                Err(e) => Err(e),
            };
            match snapshot {
                Ok(snapshot) if snapshot.init_complete => {
                    ctx.push(conn, &state.codec, init_complete(&snapshot)).await?;
                    ctx.push(conn, &state.codec, ServerEvent::State { state: snapshot }).await?;
                }
                Ok(_) => {}
                Err(e) => report(conn, state, ctx, Err(e)).await?,
            }
        }

        ClientEvent::RequestPlayerId { room_id } => {
            let Some(player_id) = ctx.player_in(&room_id).cloned() else {
                tracing::warn!(connection_id = %ctx.connection_id, %room_id, "player id requested outside a room");
                ctx.push(conn, &state.codec, ServerEvent::error("Player not found in room")).await?;
                return Ok(());
            };
            let snapshot = match resolve_room(state, ctx, &room_id).await {
                Ok(handle) => handle.snapshot().await,
                Err(e) => Err(e),
            };
            match snapshot {
                Ok(snapshot) => {
                    ctx.push(conn, &state.codec, ServerEvent::AssignPlayerId { player_id }).await?;
                    ctx.push(conn, &state.codec, ServerEvent::State { state: snapshot }).await?;
                }
                Err(e) => report(conn, state, ctx, Err(e)).await?,
            }
        }
    }

    Ok(())
}

async fn create<G: GridGenerator, M: MapRenderer>(
    state: &ServerState<G, M>,
    ctx: &mut ConnectionContext,
    name: String,
    memory_mode: bool,
    random_start_space: bool,
) -> AckResult {
    release_previous(state, ctx).await;
    let start_space = {
        let rooms = state.rooms.lock().await;
        rooms.config().start_space(random_start_space, &mut rand::rng())
    };

    let grid = match state.grid_generator.generate(start_space).await {
        Ok(grid) => grid,
        Err(e) => {
            tracing::error!(connection_id = %ctx.connection_id, error = %e, "grid generation failed");
            return AckResult::Failed {
                error: RoomError::GridUnavailable(e.to_string()).to_string(),
            };
        }
    };

    let (handle, outcome) = state.rooms.lock().await.create_room(
        CreateRoom { name, memory_mode, random_start_space, start_space, grid },
        ctx.events.clone(),
    );
    let room_id = handle.room_id().clone();
    bind(state, ctx, handle, outcome.player_id.clone()).await;

    AckResult::Created {
        room_id,
        player_id: outcome.player_id,
        memory_mode: outcome.memory_mode,
        random_start_space: outcome.random_start_space,
    }
}

async fn join<G: GridGenerator, M: MapRenderer>(
    state: &ServerState<G, M>,
    ctx: &mut ConnectionContext,
    room_id: RoomId,
    name: String,
) -> AckResult {
    release_previous(state, ctx).await;
    let handle = state.rooms.lock().await.get(&room_id);
    let joined = match handle {
        Ok(handle) => handle.join(name, ctx.events.clone()).await.map(|o| (handle, o)),
        Err(e) => Err(e),
    };
    match joined {
        Ok((handle, outcome)) => {
            bind(state, ctx, handle, outcome.player_id.clone()).await;
            AckResult::Joined {
                room_id,
                player_id: outcome.player_id,
                memory_mode: outcome.memory_mode,
                random_start_space: outcome.random_start_space,
            }
        }
        Err(e) => {
            tracing::warn!(connection_id = %ctx.connection_id, %room_id, error = %e, "join rejected");
            AckResult::Failed { error: player_message(&e) }
        }
    }
}

async fn leave<G: GridGenerator, M: MapRenderer>(
    state: &ServerState<G, M>,
    ctx: &mut ConnectionContext,
    room_id: &RoomId,
) -> AckResult {
    if ctx.player_in(room_id).is_none() {
        return AckResult::Failed { error: "Invalid room or player".into() };
    }
    match detach(state, ctx).await {
        Ok(()) => AckResult::Left { success: true },
        Err(e) => {
            tracing::warn!(connection_id = %ctx.connection_id, %room_id, error = %e, "leave failed");
            AckResult::Failed { error: player_message(&e) }
        }
    }
}

/// Leaves the room this connection is bound to, if any.
///
/// The room drops this connection's sender, so nothing more arrives from
/// it. An emptied room is destroyed.
async fn detach<G: GridGenerator, M: MapRenderer>(
    state: &ServerState<G, M>,
    ctx: &mut ConnectionContext,
) -> Result<(), RoomError> {
    let Some(membership) = ctx.membership.take() else { return Ok(()) };
    let room_id = membership.handle.room_id().clone();

    let _ = state.sessions.lock().await.unbind(ctx.connection_id);
    let outcome = membership.handle.leave(membership.player_id.clone()).await?;
    tracing::debug!(
        connection_id = %ctx.connection_id,
        %room_id,
        player_id = %membership.player_id,
        remaining = outcome.remaining,
        "left room"
    );
    if outcome.remaining == 0 {
        let _ = state.rooms.lock().await.destroy_room(&room_id).await;
    }
    Ok(())
}

/// A connection acts in one room at a time: entering another room first
/// gives up the seat in the current one. A room that already stopped has
/// no seat to give up.
async fn release_previous<G: GridGenerator, M: MapRenderer>(
    state: &ServerState<G, M>,
    ctx: &mut ConnectionContext,
) {
    if let Err(e) = detach(state, ctx).await {
        tracing::warn!(connection_id = %ctx.connection_id, error = %e, "could not leave previous room");
    }
}

/// Records the new membership in the context and the session table.
async fn bind<G: GridGenerator, M: MapRenderer>(
    state: &ServerState<G, M>,
    ctx: &mut ConnectionContext,
    handle: RoomHandle,
    player_id: PlayerId,
) {
    if let Err(e) = state
        .sessions
        .lock()
        .await
        .bind(ctx.connection_id, handle.room_id().clone(), player_id.clone())
    {
        tracing::warn!(connection_id = %ctx.connection_id, error = %e, "could not bind session");
    }
    ctx.membership = Some(Membership { handle, player_id });
}

/// The handle for `room_id`, from the membership when it matches.
async fn resolve_room<G: GridGenerator, M: MapRenderer>(
    state: &ServerState<G, M>,
    ctx: &ConnectionContext,
    room_id: &RoomId,
) -> Result<RoomHandle, RoomError> {
    if let Some(membership) = ctx.membership.as_ref().filter(|m| m.handle.room_id() == room_id) {
        return Ok(membership.handle.clone());
    }
    state.rooms.lock().await.get(room_id)
}

/// Tells the sender about a failed request. Other members hear nothing.
async fn report<G: GridGenerator, M: MapRenderer>(
    conn: &WebSocketConnection,
    state: &ServerState<G, M>,
    ctx: &mut ConnectionContext,
    outcome: Result<(), RoomError>,
) -> Result<(), CrownQuestError> {
    let Err(e) = outcome else { return Ok(()) };
    tracing::warn!(connection_id = %ctx.connection_id, error = %e, "request rejected");
    if matches!(e, RoomError::Unavailable(_)) {
        ctx.membership = None;
    }
    ctx.push(conn, &state.codec, ServerEvent::error(player_message(&e))).await
}

/// Player-facing text for a room error. A room whose actor already
/// stopped looks the same as one that never existed.
fn player_message(e: &RoomError) -> String {
    match e {
        RoomError::Unavailable(room_id) => RoomError::NotFound(room_id.clone()).to_string(),
        other => other.to_string(),
    }
}

fn init_complete(snapshot: &crownquest_protocol::RoomSnapshot) -> ServerEvent {
    ServerEvent::InitComplete {
        turn_order: snapshot.turn_order.clone(),
        current_player: snapshot.current_player.clone(),
    }
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}
