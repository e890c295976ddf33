//! Events exchanged between browser clients and the relay.
//!
//! Every frame on the wire is an [`Envelope`]. Client requests carry a
//! sequence number; when a request needs an answer (create, join, leave)
//! the server sends back an [`ServerEvent::Ack`] quoting that number.
//!
//! ```text
//! client ──{"seq":3,"payload":{"type":"client","data":{"event":"join",...}}}──▶ server
//! client ◀─{"seq":9,"payload":{"type":"server","data":{"event":"ack","seq":3,...}}}── server
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{PlayerId, RoomId};
use crate::state::{RoomSnapshot, StatePatch};

// ---------------------------------------------------------------------------
// Combat and minigame tags
// ---------------------------------------------------------------------------

/// The Combat wheel result that started a minigame. Decides the reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombatResult {
    Steal,
    Shadow,
    Truce,
    #[serde(rename = "No Effect")]
    NoEffect,
}

impl fmt::Display for CombatResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Steal => "Steal",
            Self::Shadow => "Shadow",
            Self::Truce => "Truce",
            Self::NoEffect => "No Effect",
        })
    }
}

/// Which of the three minigames to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MinigameKind {
    /// 4×4 three-in-a-row with a rolling limit of three pieces.
    #[serde(rename = "tictactoe")]
    GridCapture,
    /// 6×6 three-color flip-by-enclosure.
    #[serde(rename = "reversi")]
    AreaControl,
    /// Simultaneous sealed bets ("Triple Clash").
    #[serde(rename = "coinclash")]
    TripleClash,
}

impl MinigameKind {
    pub const ALL: [MinigameKind; 3] = [
        MinigameKind::GridCapture,
        MinigameKind::AreaControl,
        MinigameKind::TripleClash,
    ];
}

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// Who a server event should be delivered to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    /// Every connected member of the room.
    All,
    /// One player only.
    Player(PlayerId),
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Requests a browser client can make.
///
/// Internally tagged by `event`, so `Join` travels as
/// `{"event":"join","roomId":"…","name":"…"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    /// Open a new room with the sender as its first player.
    Create {
        name: String,
        #[serde(default)]
        memory_mode: bool,
        #[serde(default)]
        random_start_space: bool,
    },
    /// Enter an existing room, or reclaim a seat by name.
    Join { room_id: RoomId, name: String },
    LeaveRoom { room_id: RoomId },
    /// Publish a locally computed state change.
    Update { room_id: RoomId, state: StatePatch },
    /// Append a line to the shared game log.
    Log { room_id: RoomId, message: String },
    GameOver { room_id: RoomId, reason: String },
    RequestState { room_id: RoomId },
    RequestPlayerId { room_id: RoomId },
    Init { room_id: RoomId },
    StartMinigame {
        room_id: RoomId,
        combat_result: CombatResult,
        game_type: MinigameKind,
    },
    /// Relay a minigame state; the server does not interpret it.
    MinigameUpdate {
        room_id: RoomId,
        game_state: serde_json::Value,
    },
}

impl ClientEvent {
    /// The room a request targets; `None` only for `create`.
    pub fn room_id(&self) -> Option<&RoomId> {
        match self {
            Self::Create { .. } => None,
            Self::Join { room_id, .. }
            | Self::LeaveRoom { room_id }
            | Self::Update { room_id, .. }
            | Self::Log { room_id, .. }
            | Self::GameOver { room_id, .. }
            | Self::RequestState { room_id }
            | Self::RequestPlayerId { room_id }
            | Self::Init { room_id }
            | Self::StartMinigame { room_id, .. }
            | Self::MinigameUpdate { room_id, .. } => Some(room_id),
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Join { .. } => "join",
            Self::LeaveRoom { .. } => "leaveRoom",
            Self::Update { .. } => "update",
            Self::Log { .. } => "log",
            Self::GameOver { .. } => "gameOver",
            Self::RequestState { .. } => "requestState",
            Self::RequestPlayerId { .. } => "requestPlayerId",
            Self::Init { .. } => "init",
            Self::StartMinigame { .. } => "startMinigame",
            Self::MinigameUpdate { .. } => "minigameUpdate",
        }
    }
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Answer to a request that expects one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum AckResult {
    Created {
        room_id: RoomId,
        player_id: PlayerId,
        memory_mode: bool,
        random_start_space: bool,
    },
    Joined {
        room_id: RoomId,
        player_id: PlayerId,
        memory_mode: bool,
        random_start_space: bool,
    },
    Left { success: bool },
    Failed { error: String },
}

/// Pushes from the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Reply to the client request with sequence number `seq`.
    Ack { seq: u64, result: AckResult },
    AssignPlayerId { player_id: PlayerId },
    /// Full snapshot.
    State { state: RoomSnapshot },
    Log { message: String },
    GameOver { reason: String },
    /// Sent once when the third player arrives, and again on resync.
    InitComplete {
        turn_order: Vec<PlayerId>,
        current_player: Option<PlayerId>,
    },
    Error { message: String },
    MinigameStart {
        combat_result: CombatResult,
        game_type: MinigameKind,
    },
    MinigameStateUpdate { game_state: serde_json::Value },
    RoomCreated { room_id: RoomId },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error { message: message.into() }
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Either direction's event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum Payload {
    Client(ClientEvent),
    Server(ServerEvent),
}

/// The top-level frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Per-sender counter. Acks quote the client's value.
    pub seq: u64,
    /// Milliseconds since the sender started.
    #[serde(default)]
    pub timestamp: u64,
    pub payload: Payload,
}

impl Envelope {
    pub fn client(seq: u64, event: ClientEvent) -> Self {
        Self { seq, timestamp: 0, payload: Payload::Client(event) }
    }

    pub fn server(seq: u64, timestamp: u64, event: ServerEvent) -> Self {
        Self { seq, timestamp, payload: Payload::Server(event) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_json_shape() {
        let event = ClientEvent::Join {
            room_id: RoomId::new("r1"),
            name: "Alice".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "join");
        assert_eq!(json["roomId"], "r1");
        assert_eq!(json["name"], "Alice");
    }

    #[test]
    fn test_create_defaults_flags_when_missing() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"event":"create","name":"Alice"}"#).unwrap();
        assert_eq!(
            event,
            ClientEvent::Create {
                name: "Alice".into(),
                memory_mode: false,
                random_start_space: false,
            }
        );
        assert_eq!(event.room_id(), None);
    }

    #[test]
    fn test_start_minigame_uses_wire_tags() {
        let json = serde_json::to_value(ClientEvent::StartMinigame {
            room_id: RoomId::new("r1"),
            combat_result: CombatResult::NoEffect,
            game_type: MinigameKind::AreaControl,
        })
        .unwrap();
        assert_eq!(json["event"], "startMinigame");
        assert_eq!(json["combatResult"], "No Effect");
        assert_eq!(json["gameType"], "reversi");
    }

    #[test]
    fn test_leave_room_event_name() {
        let json = serde_json::to_value(ClientEvent::LeaveRoom {
            room_id: RoomId::new("r1"),
        })
        .unwrap();
        assert_eq!(json["event"], "leaveRoom");
    }

    #[test]
    fn test_ack_json_shape() {
        let event = ServerEvent::Ack {
            seq: 4,
            result: AckResult::Joined {
                room_id: RoomId::new("r1"),
                player_id: PlayerId::new("p1"),
                memory_mode: true,
                random_start_space: false,
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "ack");
        assert_eq!(json["seq"], 4);
        assert_eq!(json["result"]["status"], "joined");
        assert_eq!(json["result"]["playerId"], "p1");
        assert_eq!(json["result"]["memoryMode"], true);
    }

    #[test]
    fn test_init_complete_json_shape() {
        let json = serde_json::to_value(ServerEvent::InitComplete {
            turn_order: vec![PlayerId::new("b"), PlayerId::new("a")],
            current_player: Some(PlayerId::new("b")),
        })
        .unwrap();
        assert_eq!(json["event"], "initComplete");
        assert_eq!(json["currentPlayer"], "b");
    }

    #[test]
    fn test_envelope_round_trip() {
        let env = Envelope::client(
            3,
            ClientEvent::MinigameUpdate {
                room_id: RoomId::new("r1"),
                game_state: serde_json::json!({"type": "tictactoe", "board": [null]}),
            },
        );
        let bytes = serde_json::to_vec(&env).unwrap();
        let decoded: Envelope = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(env, decoded);
    }

    #[test]
    fn test_unknown_event_is_rejected() {
        let result: Result<ClientEvent, _> =
            serde_json::from_str(r#"{"event":"flyToMoon","roomId":"r"}"#);
        assert!(result.is_err());
    }
}
