//! Game snapshots and the `gameState` payload.
//!
//! The server never sends deltas. Every `gameState` push (and every reply
//! to a game command) carries the complete per-player view of the game,
//! which the client swaps in wholesale.

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::{Card, Color, Payload, ProtocolError};

// ---------------------------------------------------------------------------
// Small enums carried as integers
// ---------------------------------------------------------------------------

/// Lifecycle status of a game, as reported by the server (`state` field).
///
/// The excluded UI routes on this: lobby, table, or summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum GameStatus {
    #[default]
    Created,
    Playing,
    Complete,
    Abandoned,
}

impl TryFrom<u8> for GameStatus {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Created),
            1 => Ok(Self::Playing),
            2 => Ok(Self::Complete),
            3 => Ok(Self::Abandoned),
            other => Err(ProtocolError::InvalidMessage(format!("unknown game status {other}"))),
        }
    }
}

impl From<GameStatus> for u8 {
    fn from(value: GameStatus) -> Self {
        match value {
            GameStatus::Created => 0,
            GameStatus::Playing => 1,
            GameStatus::Complete => 2,
            GameStatus::Abandoned => 3,
        }
    }
}

/// Turn order around the table: `+1` or `-1` on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum Direction {
    #[default]
    Clockwise,
    CounterClockwise,
}

impl Direction {
    /// `+1` or `-1`.
    pub fn step(self) -> isize {
        match self {
            Self::Clockwise => 1,
            Self::CounterClockwise => -1,
        }
    }
}

impl TryFrom<i8> for Direction {
    type Error = ProtocolError;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Clockwise),
            -1 => Ok(Self::CounterClockwise),
            other => Err(ProtocolError::InvalidMessage(format!("direction must be +1 or -1, got {other}"))),
        }
    }
}

impl From<Direction> for i8 {
    fn from(value: Direction) -> Self {
        value.step() as i8
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Public view of one seat at the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtherPlayer {
    pub name: String,
    pub num_cards: usize,
}

/// The local player's own seat, with the cards in hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerHand {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cards: Vec<Card>,
}

/// One complete, validated view of the game from the local player's seat.
///
/// Decoding goes through a private raw shape so the invariants below hold for
/// every value of this type: `wild_color` is `Some` only when `discard_top`
/// is a wild card. The server keeps its last chosen color around after a
/// colored card lands on it; that stale color is dropped here.
///
/// `active_player` is taken as sent. The server doesn't shift it when a
/// lower seat leaves, so it can briefly point past `other_players`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawSnapshot")]
pub struct GameSnapshot {
    #[serde(rename = "state")]
    pub status: GameStatus,
    pub active_player: usize,
    pub direction: Direction,
    /// `None` before the first card is turned over (lobby).
    #[serde(rename = "discardPileTop", serialize_with = "none_as_empty")]
    pub discard_top: Option<Card>,
    pub discard_pile_count: usize,
    pub draw_pile_count: usize,
    pub must_draw: u32,
    /// Every seat in turn order, the local player included.
    pub other_players: Vec<OtherPlayer>,
    pub you: PlayerHand,
    #[serde(serialize_with = "none_as_empty")]
    pub wild_color: Option<Color>,
}

impl GameSnapshot {
    /// The seat whose turn it is, or `None` while `active_player` is out of
    /// range.
    pub fn active_seat(&self) -> Option<&OtherPlayer> {
        self.other_players.get(self.active_player)
    }

    /// `true` when the active seat belongs to the local player.
    pub fn is_your_turn(&self) -> bool {
        self.status == GameStatus::Playing
            && self.active_seat().is_some_and(|seat| seat.name == self.you.name)
    }
}

/// Wire shape of [`GameSnapshot`] before validation.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSnapshot {
    #[serde(rename = "state", default)]
    status: GameStatus,
    active_player: usize,
    direction: Direction,
    #[serde(rename = "discardPileTop", alias = "discardTop", default, deserialize_with = "empty_as_none")]
    discard_top: Option<Card>,
    #[serde(default)]
    discard_pile_count: usize,
    draw_pile_count: usize,
    must_draw: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    other_players: Vec<OtherPlayer>,
    you: PlayerHand,
    #[serde(default, deserialize_with = "empty_as_none")]
    wild_color: Option<Color>,
}

impl From<RawSnapshot> for GameSnapshot {
    fn from(raw: RawSnapshot) -> Self {
        let top_is_wild = raw.discard_top.is_some_and(|card| card.is_wild());
        let wild_color = if top_is_wild { raw.wild_color } else { None };

        Self {
            status: raw.status,
            active_player: raw.active_player,
            direction: raw.direction,
            discard_top: raw.discard_top,
            discard_pile_count: raw.discard_pile_count,
            draw_pile_count: raw.draw_pile_count,
            must_draw: raw.must_draw,
            other_players: raw.other_players,
            you: raw.you,
            wild_color,
        }
    }
}

// ---------------------------------------------------------------------------
// gameState payload
// ---------------------------------------------------------------------------

/// What a game-bearing payload asks the client to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameUpdate {
    /// The game is gone; drop it but keep the session identity.
    Abandoned,
    /// Swap in a new identity + snapshot, all fields together.
    Replace(GameReplacement),
}

/// The field set a non-abandoned update replaces atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameReplacement {
    pub game_id: Option<String>,
    pub game_pneumonic: Option<String>,
    pub game: GameSnapshot,
    pub is_host: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGameUpdate {
    #[serde(default)]
    abandoned: bool,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    game_id: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    game_pneumonic: Option<String>,
    /// Kept raw: an abandoned update may carry a zero-valued game that
    /// wouldn't pass snapshot validation.
    #[serde(default)]
    game: Option<Value>,
    #[serde(default)]
    is_host: bool,
}

impl GameUpdate {
    /// `true` if the payload looks like a game status (`gameState` pushes
    /// and the replies to game commands both carry one).
    pub fn is_game_payload(payload: &Payload) -> bool {
        payload.contains_key("game") || payload.contains_key("abandoned")
    }

    /// Decodes and validates a game-bearing payload.
    ///
    /// # Errors
    /// `ProtocolError::Decode` if a field has the wrong shape (including an
    /// unknown card token or a snapshot that fails validation), and
    /// `ProtocolError::InvalidMessage` for a live update with no game.
    pub fn from_payload(payload: &Payload) -> Result<Self, ProtocolError> {
        let raw: RawGameUpdate = serde_json::from_value(Value::Object(payload.clone()))
            .map_err(ProtocolError::Decode)?;

        if raw.abandoned {
            return Ok(Self::Abandoned);
        }

        let game = raw
            .game
            .ok_or_else(|| ProtocolError::InvalidMessage("game state without a game".into()))?;
        let game: GameSnapshot = serde_json::from_value(game).map_err(ProtocolError::Decode)?;

        Ok(Self::Replace(GameReplacement {
            game_id: raw.game_id,
            game_pneumonic: raw.game_pneumonic,
            game,
            is_host: raw.is_host,
        }))
    }
}

// ---------------------------------------------------------------------------
// serde helpers
// ---------------------------------------------------------------------------

/// The server writes "no card" / "no color" as `""`.
fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    match Option::<String>::deserialize(deserializer)?.as_deref() {
        None | Some("") => Ok(None),
        Some(token) => token.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

fn none_as_empty<S, T>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Display,
{
    match value {
        Some(value) => serializer.collect_str(value),
        None => serializer.serialize_str(""),
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.filter(|s| !s.is_empty()))
}

/// Go encodes an empty slice as `null`.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
