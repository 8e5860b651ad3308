//! Envelope types for Cardlink's wire format.
//!
//! Every frame on the wire is a single JSON object:
//!
//! ```text
//! client → server   { "v": "playCard", "d": { ... }, "reqId": "9f2c…" }
//! server → client   { "v": "playCard", "d": { ... }, "reqId": "9f2c…" }
//! server → client   { "v": "joinGame", "d": { "message": "…" }, "reqId": "…", "err": true }
//! server → client   { "v": "gameState", "d": { ... } }            (push, no reqId)
//! ```

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// The `d` object of an envelope: string keys, arbitrary JSON values.
pub type Payload = serde_json::Map<String, Value>;

// ---------------------------------------------------------------------------
// RequestId
// ---------------------------------------------------------------------------

/// Correlates a command with its reply.
///
/// Serialized as the plain string (`"reqId": "9f2c…"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Generates a fresh id: 32 lowercase hex characters (128 bits of
    /// randomness), so two in-flight requests never collide in practice.
    pub fn generate() -> Self {
        let bytes: [u8; 16] = rand::rng().random();
        Self(bytes.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// Borrows the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Verb
// ---------------------------------------------------------------------------

/// The `v` field of an envelope.
///
/// Known verbs get their own variant; anything else the server invents is
/// kept verbatim in [`Verb::Other`] so it can still be routed by request id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Verb {
    OpenSession,
    CreateGame,
    JoinGame,
    LeaveGame,
    StartGame,
    EndGame,
    PlayCard,
    DrawCard,
    DoneDrawing,
    /// Server push carrying a full game snapshot.
    GameState,
    Other(String),
}

impl Verb {
    /// The wire spelling of this verb.
    pub fn as_str(&self) -> &str {
        match self {
            Self::OpenSession => "openSession",
            Self::CreateGame => "createGame",
            Self::JoinGame => "joinGame",
            Self::LeaveGame => "leaveGame",
            Self::StartGame => "startGame",
            Self::EndGame => "endGame",
            Self::PlayCard => "playCard",
            Self::DrawCard => "drawCard",
            Self::DoneDrawing => "doneDrawing",
            Self::GameState => "gameState",
            Self::Other(other) => other,
        }
    }
}

impl From<String> for Verb {
    fn from(value: String) -> Self {
        match value.as_str() {
            "openSession" => Self::OpenSession,
            "createGame" => Self::CreateGame,
            "joinGame" => Self::JoinGame,
            "leaveGame" => Self::LeaveGame,
            "startGame" => Self::StartGame,
            "endGame" => Self::EndGame,
            "playCard" => Self::PlayCard,
            "drawCard" => Self::DrawCard,
            "doneDrawing" => Self::DoneDrawing,
            "gameState" => Self::GameState,
            _ => Self::Other(value),
        }
    }
}

impl From<Verb> for String {
    fn from(value: Verb) -> Self {
        match value {
            Verb::Other(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

/// An outbound frame: one command with its payload and request id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "v")]
    pub verb: Verb,

    #[serde(rename = "d")]
    pub data: Payload,

    #[serde(rename = "reqId")]
    pub request_id: RequestId,
}

/// An inbound frame: a reply to one of our commands, an error reply, or an
/// unsolicited push (no `reqId`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEnvelope {
    #[serde(rename = "v")]
    pub verb: Verb,

    /// Missing or `null` `d` decodes as an empty payload.
    #[serde(rename = "d", default, deserialize_with = "null_as_empty")]
    pub data: Payload,

    #[serde(rename = "reqId", default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,

    /// `true` when the server rejected the command; `data.message` says why.
    #[serde(rename = "err", default, skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
}

impl InboundEnvelope {
    /// The server-supplied message of an error reply, if present.
    pub fn error_message(&self) -> Option<&str> {
        self.data.get("message").and_then(Value::as_str)
    }

    /// The session id carried by an `openSession` reply.
    pub fn session_id(&self) -> Option<&str> {
        self.data.get("sessionId").and_then(Value::as_str)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Payload, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Payload>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Command: typed builders for every client → server verb
// ---------------------------------------------------------------------------

/// A client → server command, before it's wrapped in an [`Envelope`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Opens (or resumes, when a token is given) the server session.
    OpenSession { session_id: Option<String> },
    CreateGame { player_name: String },
    /// `game_id` is trimmed and upper-cased on the way out.
    JoinGame { game_id: String, player_name: String },
    LeaveGame { game_id: String, player_name: String },
    StartGame,
    EndGame,
    /// `card_index` is sent as a decimal string, `wild_color` as `""`
    /// when no color was chosen.
    PlayCard { card_index: usize, wild_color: String },
    DrawCard,
    DoneDrawing,
}

impl Command {
    /// Builds a `joinGame` command with the game code trimmed and upper-cased.
    pub fn join_game(game_code: &str, player_name: impl Into<String>) -> Self {
        Self::JoinGame {
            game_id: normalize_game_code(game_code),
            player_name: player_name.into(),
        }
    }

    /// The verb this command goes out under.
    pub fn verb(&self) -> Verb {
        match self {
            Self::OpenSession { .. } => Verb::OpenSession,
            Self::CreateGame { .. } => Verb::CreateGame,
            Self::JoinGame { .. } => Verb::JoinGame,
            Self::LeaveGame { .. } => Verb::LeaveGame,
            Self::StartGame => Verb::StartGame,
            Self::EndGame => Verb::EndGame,
            Self::PlayCard { .. } => Verb::PlayCard,
            Self::DrawCard => Verb::DrawCard,
            Self::DoneDrawing => Verb::DoneDrawing,
        }
    }

    /// The `d` object for this command.
    pub fn payload(&self) -> Payload {
        let value = match self {
            Self::OpenSession { session_id: Some(id) } => json!({ "sessionId": id }),
            Self::CreateGame { player_name } => json!({ "playerName": player_name }),
            Self::JoinGame { game_id, player_name } => {
                json!({ "gameId": normalize_game_code(game_id), "playerName": player_name })
            }
            Self::LeaveGame { game_id, player_name } => {
                json!({ "gameId": game_id, "playerName": player_name })
            }
            Self::PlayCard { card_index, wild_color } => json!({
                "cardIndex": card_index.to_string(),
                "wildColor": wild_color,
            }),
            Self::OpenSession { session_id: None }
            | Self::StartGame
            | Self::EndGame
            | Self::DrawCard
            | Self::DoneDrawing => return Payload::new(),
        };
        match value {
            Value::Object(map) => map,
            _ => Payload::new(),
        }
    }

    /// Splits the command into its verb and payload.
    pub fn into_parts(self) -> (Verb, Payload) {
        (self.verb(), self.payload())
    }
}

/// Trims surrounding whitespace and upper-cases a user-typed game code.
pub fn normalize_game_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    // =====================================================================
    // RequestId
    // =====================================================================

    #[test]
    fn test_request_id_generate_is_32_hex_chars() {
        let id = RequestId::generate();
        assert_eq!(id.as_str().len(), 32);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_request_id_generate_is_unique() {
        let a = RequestId::generate();
        let b = RequestId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_request_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&RequestId::from("abc")).unwrap();
        assert_eq!(json, "\"abc\"");
    }

    // =====================================================================
    // Verb
    // =====================================================================

    #[test]
    fn test_verb_known_spellings_map_to_variants() {
        let verb: Verb = serde_json::from_str("\"doneDrawing\"").unwrap();
        assert_eq!(verb, Verb::DoneDrawing);
        assert_eq!(serde_json::to_string(&Verb::GameState).unwrap(), "\"gameState\"");
    }

    #[test]
    fn test_verb_unknown_spelling_is_kept() {
        let verb: Verb = serde_json::from_str("\"kickPlayer\"").unwrap();
        assert_eq!(verb, Verb::Other("kickPlayer".into()));
        assert_eq!(verb.to_string(), "kickPlayer");
    }

    // =====================================================================
    // Envelopes
    // =====================================================================

    #[test]
    fn test_envelope_json_uses_short_wire_keys() {
        let envelope = Envelope {
            verb: Verb::CreateGame,
            data: Command::CreateGame { player_name: "ann".into() }.payload(),
            request_id: RequestId::from("r1"),
        };
        let json: Value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(json["v"], "createGame");
        assert_eq!(json["d"]["playerName"], "ann");
        assert_eq!(json["reqId"], "r1");
    }

    #[test]
    fn test_inbound_push_without_request_id() {
        let env: InboundEnvelope =
            serde_json::from_str(r#"{"v":"gameState","d":{"abandoned":true}}"#).unwrap();

        assert_eq!(env.verb, Verb::GameState);
        assert!(env.request_id.is_none());
        assert!(!env.error);
    }

    #[test]
    fn test_inbound_null_data_is_empty_payload() {
        let env: InboundEnvelope =
            serde_json::from_str(r#"{"v":"startGame","d":null,"reqId":"x"}"#).unwrap();
        assert!(env.data.is_empty());
        assert_eq!(env.request_id, Some(RequestId::from("x")));
    }

    #[test]
    fn test_inbound_session_id_accessor() {
        let env: InboundEnvelope = serde_json::from_str(
            r#"{"v":"openSession","d":{"sessionId":"abc123"},"reqId":"x"}"#,
        )
        .unwrap();
        assert_eq!(env.session_id(), Some("abc123"));
        assert_eq!(env.error_message(), None);
    }

    #[test]
    fn test_inbound_missing_verb_is_decode_error() {
        let result: Result<InboundEnvelope, _> = serde_json::from_str(r#"{"d":{}}"#);
        assert!(result.is_err());
    }

    // =====================================================================
    // Command
    // =====================================================================

    #[test]
    fn test_command_join_game_normalizes_code() {
        let cmd = Command::join_game("  abcd \n", "bob");
        let payload = cmd.payload();
        assert_eq!(payload["gameId"], "ABCD");
        assert_eq!(payload["playerName"], "bob");
        assert_eq!(cmd.verb(), Verb::JoinGame);
    }

    #[test]
    fn test_command_join_game_variant_normalizes_code_too() {
        let cmd = Command::JoinGame {
            game_id: " abcd ".into(),
            player_name: "bob".into(),
        };
        assert_eq!(cmd.payload()["gameId"], "ABCD");
    }

    #[test]
    fn test_command_play_card_sends_index_as_string() {
        let payload = Command::PlayCard { card_index: 3, wild_color: String::new() }.payload();
        assert_eq!(payload["cardIndex"], "3");
        assert_eq!(payload["wildColor"], "");
    }

    #[test]
    fn test_command_open_session_without_token_is_empty() {
        assert!(Command::OpenSession { session_id: None }.payload().is_empty());
        let with = Command::OpenSession { session_id: Some("s1".into()) }.payload();
        assert_eq!(with["sessionId"], "s1");
    }

    #[test]
    fn test_command_bare_verbs_have_empty_payload() {
        for cmd in [Command::StartGame, Command::EndGame, Command::DrawCard, Command::DoneDrawing] {
            assert!(cmd.payload().is_empty(), "{:?}", cmd.verb());
        }
    }
}
