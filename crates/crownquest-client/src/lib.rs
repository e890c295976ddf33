//! Client-side synchronization for Crown Quest.
//!
//! The relay trusts clients with every rule, so each client keeps a
//! mirror of the room snapshot, runs rules from `crownquest-game` against
//! it, and publishes the result. This crate holds that loop:
//!
//! - [`ClientSession`]: the mirror, snapshot validation, and bounded
//!   resync through [`SyncTracker`]
//! - [`ClientSession::run_to_completion`]: the minigame driver
//! - [`ClientSession::run_escape`]: the emergency escape loop
//! - [`connect`]: a WebSocket-backed session
//!
//! # Quick start
//!
//! ```rust,no_run
//! use crownquest_client::{SyncConfig, connect};
//!
//! # async fn demo() -> Result<(), crownquest_client::SyncError> {
//! let mut client = connect("ws://127.0.0.1:3000", SyncConfig::default()).await?;
//! client.create("Alice", false, false)?;
//! loop {
//!     let notice = client.next_notice().await?;
//!     println!("{notice:?}");
//! }
//! # }
//! ```

mod config;
mod connect;
mod error;
mod session;
pub mod sync;

pub use config::{EscapeConfig, MinigameTiming, SyncConfig};
pub use connect::connect;
pub use error::SyncError;
pub use session::{ClientSession, MinigameOutcome, Notice};
pub use sync::SyncTracker;
