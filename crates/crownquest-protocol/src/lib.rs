//! Wire protocol for Crown Quest.
//!
//! This crate defines everything that travels between the browser and the
//! relay:
//!
//! - **Identities** ([`RoomId`], [`PlayerId`]) handed out by the server.
//! - **The board** ([`Grid`], [`Space`], [`SpaceType`]) produced by the
//!   external generator, plus its content hash.
//! - **The snapshot** ([`RoomSnapshot`]) and the partial form clients
//!   publish ([`StatePatch`]).
//! - **Events** ([`ClientEvent`], [`ServerEvent`]) wrapped in an
//!   [`Envelope`].
//! - **Codec** ([`Codec`], [`JsonCodec`]) turning those into bytes.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Room actor (snapshot)
//! ```

mod board;
mod codec;
mod error;
mod event;
mod ids;
mod state;

pub use board::{GRID_SIZE, GRID_WIDTH, Grid, Space, SpaceId, SpaceType};
pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use event::{
    AckResult, ClientEvent, CombatResult, Envelope, MinigameKind, Payload, Recipient,
    ServerEvent,
};
pub use ids::{ID_LEN, PlayerId, RoomId};
pub use state::{
    Goblin, Gold, GoldPile, Item, Player, PlayerPatch, RoomSnapshot, StatePatch, Trap,
    WheelKind,
};
