//! Error types for the protocol layer.
//!
//! Each crate in Cardlink defines its own error enum. When you see a
//! `ProtocolError`, the problem is in the shape of a frame or one of its
//! values, not in networking or session handling.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, missing required fields, wrong data
    /// types, or a value that failed validation while decoding.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A card token that doesn't name any card in the deck.
    #[error("invalid card: {0:?}")]
    InvalidCard(String),

    /// A color key other than `R`, `G`, `B` or `Y`.
    #[error("invalid color: {0:?}")]
    InvalidColor(String),

    /// The message decoded but breaks a protocol rule, e.g. a game
    /// snapshot whose active player isn't one of its players.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
