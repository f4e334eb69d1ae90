//! Error types for the protocol layer.
//!
//! A `ProtocolError` always means "these bytes are not a valid message".
//! Networking problems live in the transport crate and game-rule problems
//! live in the lobby crate.

/// Errors that can occur while encoding or decoding wire messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, a missing field, or an
    /// unknown `type` tag.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded but breaks a protocol rule, e.g. a family
    /// index other than 0 or 1.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
