//! The session manager: tracks every connection and what it is bound to.
//!
//! # Concurrency note
//!
//! `SessionManager` is a plain `HashMap` wrapper. The server keeps it
//! behind a `tokio::sync::Mutex` shared by all connection handlers.

use std::collections::{HashMap, HashSet};

use crownquest_protocol::{PlayerId, RoomId};
use crownquest_transport::ConnectionId;

use crate::{Binding, Session, SessionConfig, SessionError, SessionState};

/// Manages all connection sessions.
///
/// ```text
/// connect() ──→ bind() ──→ disconnect() ──→ expire_stale() ──→ cleanup_expired()
///                 │
///                 └──→ unbind()  (leaveRoom)
/// ```
pub struct SessionManager {
    sessions: HashMap<ConnectionId, Session>,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Registers a freshly accepted connection.
    ///
    /// # Errors
    /// [`SessionError::AlreadyConnected`] if the id is already connected.
    pub fn connect(&mut self, connection_id: ConnectionId) -> Result<&Session, SessionError> {
        if let Some(existing) = self.sessions.get(&connection_id) {
            if matches!(existing.state, SessionState::Connected) {
                return Err(SessionError::AlreadyConnected(connection_id));
            }
        }

        self.sessions.insert(
            connection_id,
            Session {
                connection_id,
                state: SessionState::Connected,
                binding: None,
            },
        );
        tracing::debug!(%connection_id, "session opened");
        self.sessions
            .get(&connection_id)
            .ok_or(SessionError::NotFound(connection_id))
    }

    /// Records that the connection now acts for `player_id` in `room_id`.
    /// Replaces any previous binding.
    pub fn bind(
        &mut self,
        connection_id: ConnectionId,
        room_id: RoomId,
        player_id: PlayerId,
    ) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(&connection_id)
            .ok_or(SessionError::NotFound(connection_id))?;
        tracing::info!(%connection_id, %room_id, %player_id, "session bound");
        session.binding = Some(Binding { room_id, player_id });
        Ok(())
    }

    /// Clears the binding and returns what it was.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] for an unknown connection,
    /// [`SessionError::NotBound`] if it was not bound.
    pub fn unbind(&mut self, connection_id: ConnectionId) -> Result<Binding, SessionError> {
        let session = self
            .sessions
            .get_mut(&connection_id)
            .ok_or(SessionError::NotFound(connection_id))?;
        session
            .binding
            .take()
            .ok_or(SessionError::NotBound(connection_id))
    }

    pub fn binding(&self, connection_id: ConnectionId) -> Option<&Binding> {
        self.sessions.get(&connection_id)?.binding.as_ref()
    }

    /// Marks the connection as gone and returns its binding, if any.
    ///
    /// The binding is kept so the room stays live for the grace period.
    pub fn disconnect(
        &mut self,
        connection_id: ConnectionId,
    ) -> Result<Option<Binding>, SessionError> {
        let session = self
            .sessions
            .get_mut(&connection_id)
            .ok_or(SessionError::NotFound(connection_id))?;
        session.state = SessionState::Disconnected {
            since: std::time::Instant::now(),
        };
        tracing::info!(%connection_id, "connection dropped, grace period started");
        Ok(session.binding.clone())
    }

    /// Whether any connected, or recently disconnected, session is bound
    /// to `room_id`.
    pub fn has_live_binding(&self, room_id: &RoomId) -> bool {
        let grace = self.config.abandon_grace();
        self.sessions.values().any(|s| {
            s.is_live(grace) && s.binding.as_ref().is_some_and(|b| b.room_id == *room_id)
        })
    }

    /// Every room with at least one live binding.
    pub fn live_rooms(&self) -> HashSet<RoomId> {
        let grace = self.config.abandon_grace();
        self.sessions
            .values()
            .filter(|s| s.is_live(grace))
            .filter_map(|s| s.binding.as_ref().map(|b| b.room_id.clone()))
            .collect()
    }

    /// Expires disconnected sessions whose grace period has elapsed.
    /// Returns their connection ids.
    pub fn expire_stale(&mut self) -> Vec<ConnectionId> {
        let grace = self.config.abandon_grace();
        let mut expired = Vec::new();

        for session in self.sessions.values_mut() {
            if matches!(session.state, SessionState::Disconnected { .. }) && !session.is_live(grace)
            {
                session.state = SessionState::Expired;
                expired.push(session.connection_id);
                tracing::debug!(connection_id = %session.connection_id, "session expired");
            }
        }

        expired
    }

    /// Removes expired sessions.
    pub fn cleanup_expired(&mut self) {
        self.sessions
            .retain(|_, session| !matches!(session.state, SessionState::Expired));
    }

    pub fn get(&self, connection_id: ConnectionId) -> Option<&Session> {
        self.sessions.get(&connection_id)
    }

    /// Number of sessions in any state.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Grace-dependent behavior is tested with `abandon_grace_secs: 0`
    //! (disconnects are stale at once) and `3600` (never stale here).

    use super::*;

    // -- Helpers ----------------------------------------------------------

    fn manager_with_instant_expiry() -> SessionManager {
        SessionManager::new(SessionConfig { abandon_grace_secs: 0 })
    }

    fn manager_with_long_grace() -> SessionManager {
        SessionManager::new(SessionConfig { abandon_grace_secs: 3600 })
    }

    fn cid(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    fn room(id: &str) -> RoomId {
        RoomId::new(id)
    }

    fn bound(mgr: &mut SessionManager, conn: u64, room_id: &str, player: &str) {
        mgr.connect(cid(conn)).unwrap();
        mgr.bind(cid(conn), room(room_id), PlayerId::new(player)).unwrap();
    }

    // =====================================================================
    // connect()
    // =====================================================================

    #[test]
    fn test_connect_new_connection_is_connected_and_unbound() {
        let mut mgr = manager_with_long_grace();

        let session = mgr.connect(cid(1)).unwrap();

        assert!(matches!(session.state, SessionState::Connected));
        assert!(session.binding.is_none());
        assert_eq!(mgr.len(), 1);
    }

    #[test]
    fn test_connect_twice_returns_already_connected() {
        let mut mgr = manager_with_long_grace();
        mgr.connect(cid(1)).unwrap();

        assert_eq!(
            mgr.connect(cid(1)).unwrap_err(),
            SessionError::AlreadyConnected(cid(1))
        );
    }

    // =====================================================================
    // bind() / unbind()
    // =====================================================================

    #[test]
    fn test_bind_unknown_connection_returns_not_found() {
        let mut mgr = manager_with_long_grace();
        let err = mgr
            .bind(cid(9), room("r1"), PlayerId::new("p1"))
            .unwrap_err();
        assert_eq!(err, SessionError::NotFound(cid(9)));
    }

    #[test]
    fn test_bind_then_binding_returns_room_and_player() {
        let mut mgr = manager_with_long_grace();
        bound(&mut mgr, 1, "r1", "p1");

        let binding = mgr.binding(cid(1)).unwrap();
        assert_eq!(binding.room_id, room("r1"));
        assert_eq!(binding.player_id, PlayerId::new("p1"));
    }

    #[test]
    fn test_unbind_returns_binding_once() {
        let mut mgr = manager_with_long_grace();
        bound(&mut mgr, 1, "r1", "p1");

        assert_eq!(mgr.unbind(cid(1)).unwrap().room_id, room("r1"));
        assert_eq!(mgr.unbind(cid(1)).unwrap_err(), SessionError::NotBound(cid(1)));
        assert!(!mgr.has_live_binding(&room("r1")));
    }

    // =====================================================================
    // liveness
    // =====================================================================

    #[test]
    fn test_has_live_binding_connected_session_counts() {
        let mut mgr = manager_with_instant_expiry();
        bound(&mut mgr, 1, "r1", "p1");

        assert!(mgr.has_live_binding(&room("r1")));
        assert!(!mgr.has_live_binding(&room("r2")));
    }

    #[test]
    fn test_has_live_binding_disconnected_within_grace_counts() {
        let mut mgr = manager_with_long_grace();
        bound(&mut mgr, 1, "r1", "p1");

        let binding = mgr.disconnect(cid(1)).unwrap();

        assert_eq!(binding.unwrap().room_id, room("r1"));
        assert!(mgr.has_live_binding(&room("r1")));
    }

    #[test]
    fn test_has_live_binding_disconnected_past_grace_does_not_count() {
        let mut mgr = manager_with_instant_expiry();
        bound(&mut mgr, 1, "r1", "p1");
        mgr.disconnect(cid(1)).unwrap();

        assert!(!mgr.has_live_binding(&room("r1")));
    }

    #[test]
    fn test_has_live_binding_reconnect_on_new_connection_keeps_room() {
        let mut mgr = manager_with_instant_expiry();
        bound(&mut mgr, 1, "r1", "p1");
        mgr.disconnect(cid(1)).unwrap();
        bound(&mut mgr, 2, "r1", "p1");

        assert!(mgr.has_live_binding(&room("r1")));
    }

    #[test]
    fn test_live_rooms_lists_each_room_once() {
        let mut mgr = manager_with_instant_expiry();
        bound(&mut mgr, 1, "r1", "p1");
        bound(&mut mgr, 2, "r1", "p2");
        bound(&mut mgr, 3, "r2", "p3");
        mgr.disconnect(cid(3)).unwrap();

        let live = mgr.live_rooms();
        assert_eq!(live, HashSet::from([room("r1")]));
    }

    // =====================================================================
    // expire_stale() / cleanup_expired()
    // =====================================================================

    #[test]
    fn test_expire_stale_only_expires_disconnected() {
        let mut mgr = manager_with_instant_expiry();
        bound(&mut mgr, 1, "r1", "p1");
        bound(&mut mgr, 2, "r1", "p2");
        mgr.disconnect(cid(2)).unwrap();

        let expired = mgr.expire_stale();

        assert_eq!(expired, vec![cid(2)]);
        assert!(matches!(mgr.get(cid(1)).unwrap().state, SessionState::Connected));
    }

    #[test]
    fn test_expire_stale_within_grace_is_noop() {
        let mut mgr = manager_with_long_grace();
        bound(&mut mgr, 1, "r1", "p1");
        mgr.disconnect(cid(1)).unwrap();

        assert!(mgr.expire_stale().is_empty());
    }

    #[test]
    fn test_cleanup_expired_removes_sessions() {
        let mut mgr = manager_with_instant_expiry();
        bound(&mut mgr, 1, "r1", "p1");
        mgr.connect(cid(2)).unwrap();
        mgr.disconnect(cid(1)).unwrap();
        mgr.expire_stale();

        mgr.cleanup_expired();

        assert_eq!(mgr.len(), 1);
        assert!(mgr.get(cid(1)).is_none());
    }

    #[test]
    fn test_disconnect_unknown_connection_returns_not_found() {
        let mut mgr = manager_with_long_grace();
        assert_eq!(
            mgr.disconnect(cid(5)).unwrap_err(),
            SessionError::NotFound(cid(5))
        );
        assert!(mgr.is_empty());
    }
}
