//! End-to-end tests: real `ClientSession`s talking to a running relay.

use std::time::Duration;

use crownquest::prelude::*;
use crownquest_client::{ClientSession, Notice, SyncConfig, connect};

// =========================================================================
// Fixtures
// =========================================================================

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
                24 => SpaceType::ShadowRealm,
                _ => SpaceType::Neutral,
            };
            Space { id, kind, connections }
        })
        .collect();
    Grid { spaces }
}

// =========================================================================
// Helpers
// =========================================================================

async fn start_server() -> String {
    let server = CrownQuestServerBuilder::new()
        .bind("127.0.0.1:0")
        .http_bind("127.0.0.1:0")
        .grid_generator(FixedGridGenerator::new(lattice()))
        .build()
        .await
        .expect("server should build");
    let addr = server.local_addr().expect("should have local addr");
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    format!("ws://{addr}")
}

/// Handles notices until one matches, failing after two seconds.
async fn until(client: &mut ClientSession, want: impl Fn(&Notice) -> bool) -> Notice {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let notice = client.next_notice().await.expect("session should stay healthy");
            if want(&notice) {
                return notice;
            }
        }
    })
    .await
    .expect("timed out waiting for notice")
}

async fn seat(url: &str, room_id: Option<RoomId>, name: &str) -> (ClientSession, RoomId) {
    let mut client = connect(url, SyncConfig::default()).await.expect("should connect");
    match room_id {
        Some(id) => client.join(id, name).unwrap(),
        None => client.create(name, false, false).unwrap(),
    }
    match until(&mut client, |n| matches!(n, Notice::Joined { .. })).await {
        Notice::Joined { room_id, .. } => (client, room_id),
        other => unreachable!("{other:?}"),
    }
}

/// Three seated clients whose mirrors have seen the game start.
async fn started_room(url: &str) -> [ClientSession; 3] {
    let (alice, room_id) = seat(url, None, "Alice").await;
    let (bob, _) = seat(url, Some(room_id.clone()), "Bob").await;
    let (cara, _) = seat(url, Some(room_id), "Cara").await;
    let mut clients = [alice, bob, cara];
    for client in &mut clients {
        until(client, |n| matches!(n, Notice::Started { .. })).await;
        while !client.state().is_some_and(|s| s.init_complete) {
            until(client, |n| *n == Notice::State).await;
        }
    }
    clients
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_three_clients_converge_on_started_game() {
    let url = start_server().await;
    let clients = started_room(&url).await;

    let order = clients[0].state().unwrap().turn_order.clone();
    assert_eq!(order.len(), 3);
    for client in &clients {
        let state = client.state().unwrap();
        assert_eq!(state.turn_order, order);
        assert_eq!(state.current_player.as_ref(), order.first());
        assert_eq!(client.resync_attempts(), 0);
    }
    assert_eq!(clients.iter().filter(|c| c.is_my_turn()).count(), 1);
}

#[tokio::test]
async fn test_published_rule_reaches_other_mirrors() {
    let url = start_server().await;
    let [mut alice, mut bob, _cara] = started_room(&url).await;
    let grid = lattice();
    let hash = grid.content_hash();
    alice.set_grid(grid, &hash).unwrap();

    alice
        .act(|ctx| {
            ctx.log("Alice polished the crown");
            Ok(())
        })
        .unwrap();

    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            until(&mut bob, |n| *n == Notice::State).await;
            let log = &bob.state().unwrap().log;
            if log.last().map(String::as_str) == Some("Alice polished the crown") {
                break;
            }
        }
    })
    .await
    .expect("Bob should see Alice's update");
    assert!(bob.state().unwrap().version > 0);
}

#[tokio::test]
async fn test_leave_is_seen_by_remaining_players() {
    let url = start_server().await;
    let [mut alice, mut bob, _cara] = started_room(&url).await;

    bob.leave().unwrap();
    until(&mut bob, |n| *n == Notice::Left).await;
    assert!(bob.state().is_none());

    until(&mut alice, |n| *n == Notice::Log("Bob has left the quest".into())).await;
    until(&mut alice, |n| *n == Notice::State).await;
    let state = alice.state().unwrap();
    assert_eq!(state.players.len(), 2);
    assert_eq!(state.turn_order.len(), 2);
}
