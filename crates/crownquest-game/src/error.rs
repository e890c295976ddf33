//! Error types for the game rules.

use crownquest_protocol::{Gold, Item, PlayerId, SpaceId, SpaceType, WheelKind};

/// An action attempted outside the acting player's turn window.
///
/// These are never shown to other players: the engine rejects the call,
/// logs a warning, and leaves the snapshot untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TurnViolation {
    #[error("not your turn")]
    NotYourTurn,
    #[error("already moved this turn")]
    AlreadyMoved,
    #[error("must move or spin before ending the turn")]
    NotYetMoved,
    #[error("game has not started")]
    NotInitialized,
    #[error("game is over")]
    GameOver,
    #[error("must spin the Shadow wheel to leave the Shadow Realm")]
    MustSpinShadowWheel,
    #[error("must spin the {0} wheel before ending the turn")]
    SpinPending(WheelKind),
}

/// Errors that can occur while applying a game rule to a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error(transparent)]
    Turn(#[from] TurnViolation),

    #[error("space {from} is not connected to space {to}")]
    NotConnected { from: SpaceId, to: SpaceId },

    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),

    #[error("unknown space {0}")]
    UnknownSpace(SpaceId),

    #[error("the board has no {0} space")]
    MissingSpace(SpaceType),

    #[error("the Shadow Realm at space {0} has no exits")]
    NoExit(SpaceId),

    #[error("shop is not accessible from here")]
    ShopClosed,

    #[error("already holding the maximum number of {0}")]
    ItemLimit(Item),

    /// Not enough gold even after selling whatever the player agreed to sell.
    #[error("cannot afford {item}: need {needed} gold, have {available}")]
    ResourceShortfall {
        item: Item,
        needed: Gold,
        available: Gold,
    },

    #[error("player does not own {0}")]
    ItemNotOwned(Item),
}
