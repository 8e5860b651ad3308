//! Connection manager: owns the channel to the server and keeps it alive.
//!
//! One background task runs [`run`] for the lifetime of a client:
//!
//! ```text
//!            ┌──────────── connect failed: wait reconnect_delay ───┐
//!            ▼                                                     │
//!       Connecting ──ok──→ Open ──(recv None / error)──→ Closed ───┘
//!                            │                             │
//!                            │ first frame: openSession    └── immediately back to Connecting
//!                            ▼
//!                 reply ⇒ connected = true, outbound queue installed
//! ```
//!
//! While a connection is open the task multiplexes three event sources with
//! `tokio::select!`: frames from the server, frames queued by
//! [`GameClient`](crate::GameClient) actions, and the shutdown signal.
//! Each inbound frame is dispatched to completion (state replacement and
//! subscriber notification included) before the next one is read.

use std::sync::{Arc, Mutex, MutexGuard};

use cardlink_protocol::{
    Codec, Command, Envelope, GameUpdate, InboundEnvelope, JsonCodec, Verb,
};
use cardlink_session::SessionStore;
use cardlink_transport::{Connection, Connector};
use tokio::sync::{mpsc, oneshot};

use crate::correlator::RequestCorrelator;
use crate::state::StateMachine;
use crate::{ClientConfig, ClientError};

/// Fallback for an error reply that doesn't say what went wrong.
const UNSPECIFIED_SERVER_ERROR: &str = "server reported an error without a message";

/// Everything the client handle and the connection task share.
pub(crate) struct Shared {
    pub(crate) config: ClientConfig,
    pub(crate) codec: JsonCodec,
    pub(crate) correlator: RequestCorrelator,
    pub(crate) state: StateMachine,
    pub(crate) sessions: SessionStore,
    /// Queue into the current connection. `None` until that connection's
    /// session has opened, so nothing overtakes `openSession`.
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
}

impl Shared {
    pub(crate) fn new(config: ClientConfig, sessions: SessionStore) -> Self {
        Self {
            correlator: RequestCorrelator::new(config.request_timeout),
            config,
            codec: JsonCodec,
            state: StateMachine::new(),
            sessions,
            outbound: Mutex::new(None),
        }
    }

    /// Queues a frame on the open session. Returns `false` if there is none;
    /// the frame is dropped and its request is left to time out.
    pub(crate) fn send_frame(&self, frame: String) -> bool {
        match lock(&self.outbound).as_ref() {
            Some(tx) => tx.send(frame).is_ok(),
            None => false,
        }
    }

    fn set_outbound(&self, tx: Option<mpsc::UnboundedSender<String>>) {
        *lock(&self.outbound) = tx;
    }

    /// Routes one inbound frame.
    ///
    /// - `err: true` → reject the matching request with the server message.
    /// - `openSession` → persist the id, open the outbound queue, mark
    ///   connected, then resolve.
    /// - `gameState`, or any reply carrying a game status → State
    ///   Replacement, then resolve. A payload that fails to decode changes
    ///   nothing and rejects the matching request.
    /// - anything else → resolve.
    ///
    /// Frames that don't decode at all are logged and dropped.
    pub(crate) fn dispatch(&self, bytes: &[u8], outbound: &mpsc::UnboundedSender<String>) {
        let envelope: InboundEnvelope = match self.codec.decode(bytes) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    frame = %String::from_utf8_lossy(bytes),
                    "dropping undecodable frame"
                );
                return;
            }
        };

        tracing::debug!(
            verb = %envelope.verb,
            request_id = ?envelope.request_id,
            error = envelope.error,
            "frame received"
        );

        if envelope.error {
            let message = envelope
                .error_message()
                .unwrap_or(UNSPECIFIED_SERVER_ERROR)
                .to_string();
            match &envelope.request_id {
                Some(request_id) => {
                    self.correlator.reject(
                        request_id,
                        ClientError::Server {
                            verb: envelope.verb.clone(),
                            message,
                        },
                    );
                }
                None => tracing::warn!(verb = %envelope.verb, %message, "unsolicited server error"),
            }
            return;
        }

        match envelope.verb {
            Verb::OpenSession => {
                let session_id = envelope.session_id().map(str::to_owned);
                if let Some(id) = &session_id {
                    if let Err(e) = self.sessions.save(id) {
                        tracing::warn!(error = %e, "failed to persist session id");
                    }
                }
                self.set_outbound(Some(outbound.clone()));
                self.state.mark_open(session_id);
                tracing::info!(session_id = ?self.state.current().session_id, "session open");
            }
            _ if envelope.verb == Verb::GameState || GameUpdate::is_game_payload(&envelope.data) => {
                if !self.apply_game(&envelope) {
                    return;
                }
            }
            _ => {}
        }

        if let Some(request_id) = envelope.request_id.clone() {
            self.correlator.resolve(&request_id, envelope);
        }
    }

    /// State Replacement from a game-bearing frame. Returns `false` if the
    /// payload didn't decode; the matching request has been rejected then.
    fn apply_game(&self, envelope: &InboundEnvelope) -> bool {
        match GameUpdate::from_payload(&envelope.data) {
            Ok(update) => {
                if let GameUpdate::Replace(replacement) = &update {
                    if replacement.game.active_seat().is_none() {
                        tracing::warn!(
                            active_player = replacement.game.active_player,
                            seats = replacement.game.other_players.len(),
                            "active player outside the seat list"
                        );
                    }
                }
                self.state.apply_update(update);
                true
            }
            Err(e) => {
                tracing::warn!(verb = %envelope.verb, error = %e, "dropping invalid game state");
                if let Some(request_id) = &envelope.request_id {
                    self.correlator.reject(request_id, ClientError::Protocol(e));
                }
                false
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// How a single connection ended.
enum Outcome {
    Closed,
    Shutdown,
}

/// The connection loop. Returns only on shutdown (explicit, or the
/// client handle being dropped).
pub(crate) async fn run<C: Connector>(
    shared: Arc<Shared>,
    connector: C,
    mut shutdown: oneshot::Receiver<()>,
) {
    tracing::info!(url = %shared.config.url, "connection loop started");

    loop {
        let attempt = tokio::select! {
            _ = &mut shutdown => break,
            result = connector.connect() => result,
        };

        let conn = match attempt {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    delay_ms = shared.config.reconnect_delay.as_millis() as u64,
                    "connect failed; retrying"
                );
                tokio::select! {
                    _ = &mut shutdown => break,
                    _ = tokio::time::sleep(shared.config.reconnect_delay) => continue,
                }
            }
        };

        let outcome = serve(&shared, &conn, &mut shutdown).await;
        shared.set_outbound(None);
        shared.state.mark_closed();

        match outcome {
            Outcome::Closed => {
                tracing::info!(conn_id = %conn.id(), "connection closed; reconnecting");
            }
            Outcome::Shutdown => {
                if let Err(e) = conn.close().await {
                    tracing::debug!(error = %e, "close on shutdown failed");
                }
                break;
            }
        }
    }

    shared.set_outbound(None);
    shared.state.mark_closed();
    tracing::info!("connection loop stopped");
}

/// Drives one open connection until it closes or shutdown is requested.
async fn serve<T: Connection>(
    shared: &Shared,
    conn: &T,
    shutdown: &mut oneshot::Receiver<()>,
) -> Outcome {
    let conn_id = conn.id();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let token = shared.sessions.load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load session id; opening a new session");
        None
    });
    tracing::info!(%conn_id, resuming = token.is_some(), "connected; opening session");

    let (verb, data) = Command::OpenSession { session_id: token }.into_parts();
    let open = shared.correlator.register(verb.clone(), data.clone());
    let request_id = open.request_id().clone();
    let envelope = Envelope {
        verb,
        data,
        request_id: request_id.clone(),
    };

    let sent = match shared.codec.encode_text(&envelope) {
        Ok(frame) => conn.send(frame).await.map_err(ClientError::from),
        Err(e) => Err(ClientError::from(e)),
    };
    if let Err(e) = sent {
        tracing::warn!(%conn_id, error = %e, "failed to send openSession");
        shared.correlator.reject(&request_id, e);
        return Outcome::Closed;
    }

    let mut opening = true;
    let mut open_reply = std::pin::pin!(open.wait());

    loop {
        tokio::select! {
            _ = &mut *shutdown => return Outcome::Shutdown,

            result = &mut open_reply, if opening => {
                opening = false;
                if let Err(e) = result {
                    tracing::warn!(%conn_id, error = %e, "session did not open; reconnecting");
                    if matches!(e, ClientError::Server { .. }) {
                        // The server refused our token; start fresh next time.
                        if let Err(e) = shared.sessions.clear() {
                            tracing::warn!(error = %e, "failed to clear session id");
                        }
                    }
                    return Outcome::Closed;
                }
            }

            frame = conn.recv() => match frame {
                Ok(Some(bytes)) => shared.dispatch(&bytes, &tx),
                Ok(None) => return Outcome::Closed,
                Err(e) => {
                    tracing::debug!(%conn_id, error = %e, "receive failed");
                    return Outcome::Closed;
                }
            },

            Some(frame) = rx.recv() => {
                tracing::debug!(%conn_id, bytes = frame.len(), "frame sent");
                if let Err(e) = conn.send(frame).await {
                    tracing::warn!(%conn_id, error = %e, "send failed");
                    return Outcome::Closed;
                }
            }
        }
    }
}
