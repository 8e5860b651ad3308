//! Codec trait and the JSON implementation used on the wire.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes.
//! The client only needs something that implements [`Codec`]; today that is
//! always [`JsonCodec`], because the server speaks JSON text frames.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because the codec lives inside the connection
/// task for the whole client lifetime.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;

    /// Serializes a value into a text frame.
    ///
    /// The default goes through [`encode`](Self::encode) and rejects output
    /// that isn't UTF-8, which a text codec never produces.
    fn encode_text<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        let bytes = self.encode(value)?;
        String::from_utf8(bytes).map_err(|e| {
            ProtocolError::InvalidMessage(format!("encoded frame is not UTF-8: {e}"))
        })
    }
}

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use cardlink_protocol::{Codec, Envelope, JsonCodec, Payload, RequestId, Verb};
///
/// let codec = JsonCodec;
/// let envelope = Envelope {
///     verb: Verb::DrawCard,
///     data: Payload::new(),
///     request_id: RequestId::from("abc"),
/// };
///
/// let text = codec.encode_text(&envelope).unwrap();
/// assert_eq!(text, r#"{"v":"drawCard","d":{},"reqId":"abc"}"#);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }

    fn encode_text<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InboundEnvelope, Verb};

    #[test]
    fn test_json_codec_decode_inbound_error_frame() {
        let frame = br#"{"v":"joinGame","d":{"message":"Unable to find game"},"reqId":"r1","err":true}"#;
        let env: InboundEnvelope = JsonCodec.decode(frame).unwrap();

        assert_eq!(env.verb, Verb::JoinGame);
        assert!(env.error);
        assert_eq!(env.error_message(), Some("Unable to find game"));
    }

    #[test]
    fn test_json_codec_decode_garbage_returns_decode_error() {
        let result: Result<InboundEnvelope, _> = JsonCodec.decode(b"not json at all");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
