use crownquest_game::GameError;
use crownquest_game::minigame::MinigameError;
use crownquest_protocol::ProtocolError;

/// Errors raised while keeping a client in step with the relay.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The local mirror kept disagreeing with the server after every
    /// allowed `requestState`.
    #[error("state diverged from the server after {attempts} resync attempts")]
    Divergence { attempts: u32 },

    #[error("Turn order corrupted")]
    TurnOrderCorrupted,

    #[error("grid hash mismatch: server sent {expected}, local copy hashes to {actual}")]
    GridMismatch { expected: String, actual: String },

    #[error("not in a room")]
    NotInRoom,

    #[error("no room state received yet")]
    NoState,

    #[error("no grid loaded")]
    NoGrid,

    #[error("no minigame is running")]
    NoMinigame,

    #[error("connection to the server is closed")]
    Closed,

    #[error("could not connect: {0}")]
    Connect(#[source] Box<tokio_tungstenite::tungstenite::Error>),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Game(#[from] GameError),

    #[error(transparent)]
    Minigame(#[from] MinigameError),

    #[error("minigame state encoding: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crownquest_game::TurnViolation;

    #[test]
    fn test_turn_order_message_matches_log_text() {
        assert_eq!(SyncError::TurnOrderCorrupted.to_string(), "Turn order corrupted");
    }

    #[test]
    fn test_game_error_converts_transparently() {
        let err: SyncError = GameError::Turn(TurnViolation::GameOver).into();
        assert!(matches!(err, SyncError::Game(GameError::Turn(TurnViolation::GameOver))));
        assert_eq!(err.to_string(), GameError::Turn(TurnViolation::GameOver).to_string());
    }
}
