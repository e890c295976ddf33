//! Connection session tracking for Crown Quest.
//!
//! The relay identifies players by the `PlayerId` it hands out, but a
//! browser tab talks to it over a connection that can drop and come back
//! under a new `ConnectionId`. This crate keeps the mapping between the
//! two:
//!
//! 1. **Session tracking**: one [`Session`] per connection, connected or
//!    recently disconnected ([`SessionState`])
//! 2. **Bindings**: which room and player a connection speaks for
//!    ([`Binding`])
//! 3. **Liveness**: whether a room still has anyone attached, which
//!    drives abandoned-room cleanup
//!
//! # How it fits in the stack
//!
//! ```text
//! Room Layer (above)  ← deleted when no live session is bound to it
//!     ↕
//! Session Layer (this crate)  ← connection ↔ (room, player)
//!     ↕
//! Transport Layer (below)  ← provides ConnectionId
//! ```

mod error;
mod manager;
mod session;

pub use error::SessionError;
pub use manager::SessionManager;
pub use session::{Binding, Session, SessionConfig, SessionState};
