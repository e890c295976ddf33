//! Error types for the session layer.

use crownquest_transport::ConnectionId;

/// Errors that can occur during session management.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// No session exists for the given connection.
    #[error("session not found for {0}")]
    NotFound(ConnectionId),

    /// The connection already has a live session.
    #[error("{0} already has an active session")]
    AlreadyConnected(ConnectionId),

    /// The connection has not created or joined a room yet.
    #[error("{0} is not bound to a room")]
    NotBound(ConnectionId),
}
