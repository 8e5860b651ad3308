//! Unified error type for the Cardlink client.

use std::time::Duration;

use cardlink_protocol::{Payload, ProtocolError, RequestId, Verb};
use cardlink_session::SessionError;
use cardlink_transport::TransportError;

/// Everything an action on [`GameClient`](crate::GameClient) can fail with.
///
/// The first group are the outcomes a caller usually wants to tell apart:
/// the server said no, the server said nothing, or there was no session to
/// say anything over. The `#[from]` variants wrap lower-layer errors so `?`
/// converts them automatically.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server answered with `err: true`. Not retried.
    #[error("{verb} rejected by server: {message}")]
    Server { verb: Verb, message: String },

    /// No reply arrived before the request deadline. The request is gone
    /// from the pending table; a late reply is ignored.
    #[error("{verb} request {request_id} timed out after {timeout:?} (payload {data:?})")]
    Timeout {
        verb: Verb,
        data: Payload,
        request_id: RequestId,
        timeout: Duration,
    },

    /// No session opened within the request deadline, so the command was
    /// never sent.
    #[error("not connected: {verb} was not sent")]
    NotConnected { verb: Verb },

    /// The action needs a current game and there isn't one.
    #[error("not in a game")]
    NotInGame,

    /// The client was shut down (or dropped) before the action settled.
    #[error("client closed")]
    Closed,

    /// A reply or push couldn't be decoded or failed validation.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl ClientError {
    /// `true` for [`ClientError::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// The server-supplied message of a [`ClientError::Server`].
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Server { message, .. } => Some(message),
            _ => None,
        }
    }
}
