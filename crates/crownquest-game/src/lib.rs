//! Rules for Crown Quest.
//!
//! The relay server never interprets game state, so every rule lives here
//! and runs inside the client whose turn it is. Rules mutate a local
//! mirror of the [`RoomSnapshot`](crownquest_protocol::RoomSnapshot)
//! through a [`GameContext`]; the caller then publishes the result.
//!
//! # Modules
//!
//! - [`turn`]: moving, landing effects, and handing the turn on
//! - [`wheel`]: Good, Bad, Combat, and Shadow wheels
//! - [`escape`]: the emergency exit when everyone is in the Shadow Realm
//! - [`shop`]: buying and using items
//! - [`minigame`]: the three Combat minigames and their rewards
//! - [`pathing`]: directions and distances on the 5×5 lattice

mod context;
mod error;
pub mod escape;
pub mod minigame;
pub mod pathing;
pub mod shop;
pub mod turn;
pub mod wheel;

#[cfg(test)]
mod testing;

pub use context::{Chooser, Decline, FirstChoice, GameContext, TargetPurpose};
pub use error::{GameError, TurnViolation};
