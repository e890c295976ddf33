//! Room lifecycle management for Crown Quest.
//!
//! Each room runs as an isolated Tokio task (actor model) holding the
//! authoritative snapshot, the immutable grid, and the last relayed
//! minigame state. The server never runs game rules: it merges what
//! clients publish and fans the result out.
//!
//! # Key types
//!
//! - [`RoomManager`]: creates/destroys rooms, sweeps abandoned ones
//! - [`RoomRepository`]: where handles live ([`InMemoryRoomRepository`])
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`RoomPhase`]: lifecycle read off the snapshot
//! - [`RoomConfig`]: seats, start space, starting gold, stale-update policy

mod config;
mod error;
mod manager;
pub mod merge;
mod repository;
mod room;

pub use config::{RoomConfig, RoomPhase};
pub use error::RoomError;
pub use manager::{CreateRoom, RoomManager};
pub use repository::{InMemoryRoomRepository, RoomRepository};
pub use room::{JoinOutcome, LeaveOutcome, MemberSender, NewRoom, RoomHandle, RoomInfo};
