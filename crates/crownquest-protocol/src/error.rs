//! Error types for the protocol layer.
//!
//! Each crate defines its own error enum so a `ProtocolError` always
//! means "the bytes or their shape were wrong", never "the room was
//! full" or "the socket died".

/// Errors that can occur while encoding, decoding, or validating wire data.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, missing fields, unknown
    /// event names.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message parsed but breaks a protocol rule, e.g. a grid whose
    /// connections point at spaces that do not exist.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
