//! Unified error type for the Crown Quest server.

use crownquest_protocol::ProtocolError;
use crownquest_room::RoomError;
use crownquest_session::SessionError;
use crownquest_transport::TransportError;

/// Failure of an external helper program (grid generator, map renderer).
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// The command list was empty.
    #[error("no command configured for {0}")]
    NotConfigured(&'static str),

    /// The process could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The process ran but exited unsuccessfully.
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    /// The process printed something we could not use.
    #[error("unusable output from {program}: {reason}")]
    BadOutput { program: String, reason: String },
}

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum CrownQuestError {
    /// A transport-level error (bind, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (missing, full, stale update).
    #[error(transparent)]
    Room(#[from] RoomError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    /// Binding or serving the HTTP listener failed.
    #[error("http server: {0}")]
    Http(#[source] std::io::Error),

    /// An environment variable held an unusable value.
    #[error("invalid configuration: {0}")]
    Config(String),
}
