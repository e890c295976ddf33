//! Integration tests for the Crown Quest server, handler, and full connection flow.

use std::collections::HashSet;
use std::time::Duration;

use crownquest::prelude::*;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Fixtures
// =========================================================================

/// 5×5 board, every orthogonal neighbor connected, Crown in a corner.
fn lattice() -> Grid {
    let spaces = (0..25u32)
        .map(|id| {
            let (row, col) = (id / 5, id % 5);
            let mut connections = Vec::new();
            if row > 0 {
                connections.push(id - 5);
            }
            if row < 4 {
                connections.push(id + 5);
            }
            if col > 0 {
                connections.push(id - 1);
            }
            if col < 4 {
                connections.push(id + 1);
            }
            let kind = match id {
                0 => SpaceType::Crown,
                12 => SpaceType::Start,
                _ => SpaceType::Neutral,
            };
            Space { id, kind, connections }
        })
        .collect();
    Grid { spaces }
}

/// A generator that always fails.
struct BrokenGenerator;

impl GridGenerator for BrokenGenerator {
    async fn generate(&self, _start_space: u32) -> Result<Grid, ToolError> {
        Err(ToolError::NotConfigured("grid generator"))
    }
}

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn start_server() -> String {
    start_with(SessionConfig::default()).await
}

/// Starts a server on random ports and returns the WebSocket address.
async fn start_with(session_config: SessionConfig) -> String {
    let server = CrownQuestServerBuilder::new()
        .bind("127.0.0.1:0")
        .http_bind("127.0.0.1:0")
        .session_config(session_config)
        .grid_generator(FixedGridGenerator::new(lattice()))
        .build()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send(ws: &mut ClientWs, seq: u64, event: ClientEvent) {
    let text = serde_json::to_string(&Envelope::client(seq, event)).expect("encode");
    ws.send(Message::Text(text.into())).await.expect("send");
}

/// Next server event, failing the test after two seconds of silence.
async fn recv(ws: &mut ClientWs) -> ServerEvent {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for server event")
            .expect("stream ended")
            .expect("recv");
        if !(msg.is_text() || msg.is_binary()) {
            continue;
        }
        let envelope: Envelope = serde_json::from_slice(&msg.into_data()).expect("decode");
        match envelope.payload {
            Payload::Server(event) => return event,
            other => panic!("expected server payload, got {other:?}"),
        }
    }
}

async fn recv_n(ws: &mut ClientWs, n: usize) -> Vec<ServerEvent> {
    let mut events = Vec::with_capacity(n);
    for _ in 0..n {
        events.push(recv(ws).await);
    }
    events
}

/// Asserts nothing arrives for a short while.
async fn assert_quiet(ws: &mut ClientWs) {
    let next = tokio::time::timeout(Duration::from_millis(150), ws.next()).await;
    assert!(next.is_err(), "unexpected frame: {next:?}");
}

/// Creates a room as `name` and consumes the greeting.
async fn create(ws: &mut ClientWs, name: &str) -> (RoomId, PlayerId) {
    send(
        ws,
        1,
        ClientEvent::Create {
            name: name.into(),
            memory_mode: false,
            random_start_space: false,
        },
    )
    .await;
    let events = recv_n(ws, 4).await;
    match &events[0] {
        ServerEvent::Ack {
            seq: 1,
            result: AckResult::Created { room_id, player_id, .. },
        } => (room_id.clone(), player_id.clone()),
        other => panic!("expected Created ack, got {other:?}"),
    }
}

/// Joins `room_id` as `name` and returns the ack result; consumes nothing else.
async fn join(ws: &mut ClientWs, room_id: &RoomId, name: &str) -> AckResult {
    send(
        ws,
        1,
        ClientEvent::Join {
            room_id: room_id.clone(),
            name: name.into(),
        },
    )
    .await;
    match recv(ws).await {
        ServerEvent::Ack { seq: 1, result } => result,
        other => panic!("expected ack, got {other:?}"),
    }
}

fn joined_id(result: AckResult) -> PlayerId {
    match result {
        AckResult::Joined { player_id, .. } => player_id,
        other => panic!("expected Joined, got {other:?}"),
    }
}

/// Three connected players in a started room, with all setup traffic drained.
async fn full_room(addr: &str) -> (RoomId, Vec<(ClientWs, PlayerId)>) {
    let mut alice = connect(addr).await;
    let (room_id, alice_id) = create(&mut alice, "Alice").await;

    let mut bob = connect(addr).await;
    let bob_id = joined_id(join(&mut bob, &room_id, "Bob").await);
    recv_n(&mut bob, 3).await; // log, assignPlayerId, state
    recv_n(&mut alice, 1).await; // log

    let mut cara = connect(addr).await;
    let cara_id = joined_id(join(&mut cara, &room_id, "Cara").await);
    recv_n(&mut cara, 5).await; // log, assignPlayerId, state, initComplete, state
    recv_n(&mut alice, 3).await; // log, initComplete, state
    recv_n(&mut bob, 3).await;

    (room_id, vec![(alice, alice_id), (bob, bob_id), (cara, cara_id)])
}

// =========================================================================
// Create / join
// =========================================================================

#[tokio::test]
async fn test_create_acks_then_greets_creator() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send(
        &mut ws,
        7,
        ClientEvent::Create {
            name: "Alice".into(),
            memory_mode: true,
            random_start_space: false,
        },
    )
    .await;

    let events = recv_n(&mut ws, 4).await;
    let ServerEvent::Ack { seq: 7, result: AckResult::Created { room_id, player_id, memory_mode, .. } } =
        &events[0]
    else {
        panic!("expected Created ack, got {:?}", events[0]);
    };
    assert!(*memory_mode);
    assert_eq!(room_id.as_str().len(), 8);
    assert_eq!(events[1], ServerEvent::RoomCreated { room_id: room_id.clone() });
    assert_eq!(events[2], ServerEvent::AssignPlayerId { player_id: player_id.clone() });
    let ServerEvent::State { state } = &events[3] else {
        panic!("expected state, got {:?}", events[3]);
    };
    assert_eq!(state.players.len(), 1);
    assert_eq!(state.players[0].position, 12);
    assert_eq!(state.players[0].gold, 1);
}

#[tokio::test]
async fn test_create_with_failing_generator_stores_no_room() {
    let server = CrownQuestServerBuilder::new()
        .bind("127.0.0.1:0")
        .http_bind("127.0.0.1:0")
        .grid_generator(BrokenGenerator)
        .build()
        .await
        .unwrap();
    let addr = server.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    let mut ws = connect(&addr).await;

    send(
        &mut ws,
        1,
        ClientEvent::Create {
            name: "Alice".into(),
            memory_mode: false,
            random_start_space: true,
        },
    )
    .await;

    assert_eq!(
        recv(&mut ws).await,
        ServerEvent::Ack {
            seq: 1,
            result: AckResult::Failed { error: "Failed to generate grid".into() },
        }
    );
    assert_quiet(&mut ws).await;
}

#[tokio::test]
async fn test_join_unknown_room_fails() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    let result = join(&mut ws, &RoomId::new("nosuchrm"), "Bob").await;

    assert_eq!(result, AckResult::Failed { error: "Room does not exist".into() });
}

#[tokio::test]
async fn test_third_player_starts_game_for_everyone() {
    let addr = start_server().await;
    let mut alice = connect(&addr).await;
    let (room_id, alice_id) = create(&mut alice, "Alice").await;

    let mut bob = connect(&addr).await;
    let bob_id = joined_id(join(&mut bob, &room_id, "Bob").await);
    assert_eq!(recv(&mut alice).await, ServerEvent::Log { message: "Bob has joined the quest".into() });
    recv_n(&mut bob, 3).await;

    let mut cara = connect(&addr).await;
    let cara_id = joined_id(join(&mut cara, &room_id, "Cara").await);
    let seated: HashSet<PlayerId> = [alice_id, bob_id, cara_id].into_iter().collect();

    for (ws, skip) in [(&mut alice, 1), (&mut bob, 1), (&mut cara, 3)] {
        recv_n(ws, skip).await;
        match recv(ws).await {
            ServerEvent::InitComplete { turn_order, current_player } => {
                assert_eq!(current_player.as_ref(), turn_order.first());
                assert_eq!(turn_order.iter().cloned().collect::<HashSet<_>>(), seated);
            }
            other => panic!("expected initComplete, got {other:?}"),
        }
        match recv(ws).await {
            ServerEvent::State { state } => assert!(state.init_complete),
            other => panic!("expected state, got {other:?}"),
        }
        assert_quiet(ws).await;
    }
}

#[tokio::test]
async fn test_fourth_player_is_turned_away() {
    let addr = start_server().await;
    let (room_id, _players) = full_room(&addr).await;

    let mut dave = connect(&addr).await;
    let result = join(&mut dave, &room_id, "Dave").await;

    assert_eq!(result, AckResult::Failed { error: "Room is full".into() });
}

#[tokio::test]
async fn test_rejoin_by_name_after_disconnect_keeps_id() {
    let addr = start_server().await;
    let (room_id, mut players) = full_room(&addr).await;
    let (bob, bob_id) = players.remove(1);
    drop(bob);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut back = connect(&addr).await;
    let result = join(&mut back, &room_id, "BOB").await;

    assert_eq!(joined_id(result), bob_id);
    let events = recv_n(&mut back, 3).await;
    assert_eq!(events[0], ServerEvent::AssignPlayerId { player_id: bob_id });
    assert!(matches!(events[1], ServerEvent::State { .. }));
    assert!(matches!(events[2], ServerEvent::InitComplete { .. }));
}

// =========================================================================
// Update / log / requests
// =========================================================================

#[tokio::test]
async fn test_update_reaches_every_member_including_sender() {
    let addr = start_server().await;
    let (room_id, mut players) = full_room(&addr).await;
    let bob_id = players[1].1.clone();

    let patch = StatePatch {
        round: Some(4),
        ..StatePatch::default()
    };
    send(&mut players[1].0, 2, ClientEvent::Update { room_id, state: patch }).await;

    for (ws, _) in &mut players {
        match recv(ws).await {
            ServerEvent::State { state } => {
                assert_eq!(state.round, 4);
                assert!(state.player(&bob_id).is_some());
            }
            other => panic!("expected state, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_update_unknown_room_errors_sender_only() {
    let addr = start_server().await;
    let (_room_id, mut players) = full_room(&addr).await;

    send(
        &mut players[0].0,
        2,
        ClientEvent::Update {
            room_id: RoomId::new("gone0000"),
            state: StatePatch::default(),
        },
    )
    .await;

    assert_eq!(recv(&mut players[0].0).await, ServerEvent::error("Room does not exist"));
    assert_quiet(&mut players[1].0).await;
}

#[tokio::test]
async fn test_log_is_broadcast_and_kept() {
    let addr = start_server().await;
    let (room_id, mut players) = full_room(&addr).await;

    send(
        &mut players[2].0,
        2,
        ClientEvent::Log { room_id: room_id.clone(), message: "Cara found gold".into() },
    )
    .await;
    for (ws, _) in &mut players {
        assert_eq!(recv(ws).await, ServerEvent::Log { message: "Cara found gold".into() });
    }

    send(&mut players[0].0, 3, ClientEvent::RequestState { room_id }).await;
    match recv(&mut players[0].0).await {
        ServerEvent::State { state } => assert_eq!(state.log.last().unwrap(), "Cara found gold"),
        other => panic!("expected state, got {other:?}"),
    }
    assert!(matches!(recv(&mut players[0].0).await, ServerEvent::InitComplete { .. }));
}

#[tokio::test]
async fn test_request_player_id_resends_identity() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    let (room_id, player_id) = create(&mut ws, "Alice").await;

    send(&mut ws, 2, ClientEvent::RequestPlayerId { room_id: room_id.clone() }).await;
    assert_eq!(recv(&mut ws).await, ServerEvent::AssignPlayerId { player_id });
    assert!(matches!(recv(&mut ws).await, ServerEvent::State { .. }));

    // Not initialized yet: init answers with nothing.
    send(&mut ws, 3, ClientEvent::Init { room_id }).await;
    assert_quiet(&mut ws).await;
}

#[tokio::test]
async fn test_malformed_frame_gets_error_and_connection_survives() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    ws.send(Message::Text("{not json".into())).await.unwrap();
    assert_eq!(recv(&mut ws).await, ServerEvent::error("Malformed message"));

    create(&mut ws, "Alice").await;
}

// =========================================================================
// Minigames
// =========================================================================

#[tokio::test]
async fn test_minigame_start_and_updates_are_relayed() {
    let addr = start_server().await;
    let (room_id, mut players) = full_room(&addr).await;

    send(
        &mut players[0].0,
        2,
        ClientEvent::StartMinigame {
            room_id: room_id.clone(),
            combat_result: CombatResult::Steal,
            game_type: MinigameKind::GridCapture,
        },
    )
    .await;
    for (ws, _) in &mut players {
        assert_eq!(
            recv(ws).await,
            ServerEvent::MinigameStart {
                combat_result: CombatResult::Steal,
                game_type: MinigameKind::GridCapture,
            }
        );
    }

    let blob = serde_json::json!({"board": [null, "X"], "currentTurn": 1});
    send(
        &mut players[1].0,
        2,
        ClientEvent::MinigameUpdate { room_id, game_state: blob.clone() },
    )
    .await;
    for (ws, _) in &mut players {
        assert_eq!(recv(ws).await, ServerEvent::MinigameStateUpdate { game_state: blob.clone() });
    }
}

// =========================================================================
// Leave / abandonment
// =========================================================================

#[tokio::test]
async fn test_leave_room_notifies_and_last_leave_deletes_room() {
    let addr = start_server().await;
    let mut alice = connect(&addr).await;
    let (room_id, _) = create(&mut alice, "Alice").await;
    let mut bob = connect(&addr).await;
    joined_id(join(&mut bob, &room_id, "Bob").await);
    recv_n(&mut bob, 3).await;
    recv_n(&mut alice, 1).await;

    send(&mut bob, 2, ClientEvent::LeaveRoom { room_id: room_id.clone() }).await;
    assert_eq!(
        recv(&mut bob).await,
        ServerEvent::Ack { seq: 2, result: AckResult::Left { success: true } }
    );
    assert_eq!(recv(&mut alice).await, ServerEvent::Log { message: "Bob has left the quest".into() });
    match recv(&mut alice).await {
        ServerEvent::State { state } => assert_eq!(state.players.len(), 1),
        other => panic!("expected state, got {other:?}"),
    }

    // Leaving twice is refused.
    send(&mut bob, 3, ClientEvent::LeaveRoom { room_id: room_id.clone() }).await;
    // The first leave's log is still queued ahead of the refusal.
    let ack = recv_n(&mut bob, 2).await;
    assert!(ack.contains(&ServerEvent::Ack {
        seq: 3,
        result: AckResult::Failed { error: "Invalid room or player".into() },
    }));

    send(&mut alice, 2, ClientEvent::LeaveRoom { room_id: room_id.clone() }).await;
    recv_n(&mut alice, 2).await; // ack, log
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut carol = connect(&addr).await;
    let result = join(&mut carol, &room_id, "Carol").await;
    assert_eq!(result, AckResult::Failed { error: "Room does not exist".into() });
}

#[tokio::test]
async fn test_join_elsewhere_gives_up_previous_seat() {
    let addr = start_server().await;
    let mut alice = connect(&addr).await;
    let (first_room, _) = create(&mut alice, "Alice").await;
    let mut bob = connect(&addr).await;
    joined_id(join(&mut bob, &first_room, "Bob").await);
    recv_n(&mut bob, 3).await;
    recv_n(&mut alice, 1).await;

    let mut cara = connect(&addr).await;
    let (second_room, _) = create(&mut cara, "Cara").await;

    let result = join(&mut bob, &second_room, "Bob").await;
    assert!(matches!(result, AckResult::Joined { ref room_id, .. } if *room_id == second_room));
    let events = recv_n(&mut bob, 4).await;
    assert_eq!(events[0], ServerEvent::Log { message: "Bob has left the quest".into() });
    assert_eq!(events[1], ServerEvent::Log { message: "Bob has joined the quest".into() });
    match &events[3] {
        ServerEvent::State { state } => assert_eq!(state.players.len(), 2),
        other => panic!("expected state, got {other:?}"),
    }

    assert_eq!(recv(&mut alice).await, ServerEvent::Log { message: "Bob has left the quest".into() });
    match recv(&mut alice).await {
        ServerEvent::State { state } => assert_eq!(state.players.len(), 1),
        other => panic!("expected state, got {other:?}"),
    }

    // Traffic in the first room no longer reaches Bob.
    send(
        &mut alice,
        2,
        ClientEvent::Log { room_id: first_room.clone(), message: "anyone there?".into() },
    )
    .await;
    assert_eq!(recv(&mut alice).await, ServerEvent::Log { message: "anyone there?".into() });
    assert_quiet(&mut bob).await;
}

#[tokio::test]
async fn test_create_while_seated_leaves_previous_room() {
    let addr = start_server().await;
    let mut alice = connect(&addr).await;
    let (first_room, _) = create(&mut alice, "Alice").await;
    let mut bob = connect(&addr).await;
    joined_id(join(&mut bob, &first_room, "Bob").await);
    recv_n(&mut bob, 3).await;
    recv_n(&mut alice, 1).await;

    send(
        &mut bob,
        2,
        ClientEvent::Create { name: "Bob".into(), memory_mode: false, random_start_space: false },
    )
    .await;
    let events = recv_n(&mut bob, 5).await; // ack, roomCreated, log, assignPlayerId, state
    let ServerEvent::Ack { seq: 2, result: AckResult::Created { room_id, .. } } = &events[0] else {
        panic!("expected Created ack, got {:?}", events[0]);
    };
    assert_ne!(*room_id, first_room);
    assert_eq!(events[2], ServerEvent::Log { message: "Bob has left the quest".into() });

    assert_eq!(recv(&mut alice).await, ServerEvent::Log { message: "Bob has left the quest".into() });
    match recv(&mut alice).await {
        ServerEvent::State { state } => assert_eq!(state.players.len(), 1),
        other => panic!("expected state, got {other:?}"),
    }
}

#[tokio::test]
async fn test_abandoned_room_is_deleted_after_grace() {
    let addr = start_with(SessionConfig { abandon_grace_secs: 0 }).await;
    let mut alice = connect(&addr).await;
    let (room_id, _) = create(&mut alice, "Alice").await;

    alice.close(None).await.unwrap();
    drop(alice);
    tokio::time::sleep(Duration::from_millis(200)).await;

    let mut bob = connect(&addr).await;
    let result = join(&mut bob, &room_id, "Bob").await;
    assert_eq!(result, AckResult::Failed { error: "Room does not exist".into() });
}

#[tokio::test]
async fn test_room_with_live_player_survives_sweep() {
    let addr = start_with(SessionConfig { abandon_grace_secs: 0 }).await;
    let mut alice = connect(&addr).await;
    let (room_id, _) = create(&mut alice, "Alice").await;
    let mut bob = connect(&addr).await;
    joined_id(join(&mut bob, &room_id, "Bob").await);

    drop(bob);
    tokio::time::sleep(Duration::from_millis(200)).await;

    let mut back = connect(&addr).await;
    let result = join(&mut back, &room_id, "Bob").await;
    assert!(matches!(result, AckResult::Joined { .. }));
}
