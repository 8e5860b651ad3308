//! Wire protocol for Cardlink.
//!
//! This crate defines the "language" the client and the game server speak:
//!
//! - **Envelopes** ([`Envelope`], [`InboundEnvelope`], [`Verb`],
//!   [`Command`]): the frames that travel on the wire.
//! - **Game data** ([`Card`], [`GameSnapshot`], [`GameUpdate`]): the
//!   validated contents of `gameState` payloads.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how frames are turned
//!   into text and back.
//! - **Errors** ([`ProtocolError`]): what can go wrong while encoding,
//!   decoding, or validating.
//!
//! # Architecture
//!
//! ```text
//! Transport (text frames) → Protocol (envelopes) → Client (correlation, state)
//! ```

mod card;
mod codec;
mod error;
mod game;
mod types;

pub use card::{Card, Color, Rank};
pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use game::{
    Direction, GameReplacement, GameSnapshot, GameStatus, GameUpdate, OtherPlayer, PlayerHand,
};
pub use types::{
    Command, Envelope, InboundEnvelope, Payload, RequestId, Verb, normalize_game_code,
};
