//! # Crown Quest
//!
//! Relay server for Crown Quest, a three-player party board game played
//! in the browser.
//!
//! The server holds each room's authoritative snapshot and fans every
//! change out to the room's players. It does not run game rules: clients
//! compute moves, wheels, items and minigames (see `crownquest-game`) and
//! publish the result. Besides the WebSocket protocol it serves the
//! room's grid and a rendered map over HTTP, both produced by external
//! helper programs.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use crownquest::prelude::*;
//!
//! # async fn start() -> Result<(), CrownQuestError> {
//! let server = CrownQuestServer::builder()
//!     .bind("0.0.0.0:3000")
//!     .http_bind("0.0.0.0:3001")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod http;
mod server;
pub mod tools;

pub use config::ServerConfig;
pub use error::{CrownQuestError, ToolError};
pub use server::{CrownQuestServer, CrownQuestServerBuilder};

/// Everything needed to start a server and talk to it.
pub mod prelude {
    pub use crate::tools::{
        CommandGridGenerator, CommandMapRenderer, FixedGridGenerator, GridGenerator, MapMarker,
        MapRenderer,
    };
    pub use crate::{CrownQuestError, CrownQuestServer, CrownQuestServerBuilder, ServerConfig, ToolError};
    pub use crownquest_protocol::{
        AckResult, ClientEvent, Codec, CombatResult, Envelope, Grid, JsonCodec, MinigameKind,
        Payload, PlayerId, RoomId, RoomSnapshot, ServerEvent, Space, SpaceType, StatePatch,
    };
    pub use crownquest_room::RoomConfig;
    pub use crownquest_session::SessionConfig;
}
