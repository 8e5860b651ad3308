//! Request correlation: matching replies to the requests that caused them.
//!
//! Every outbound command gets a fresh [`RequestId`]. The correlator keeps
//! one [`PendingRequest`] per id until exactly one of three things happens:
//!
//! ```text
//!              ┌── reply (err=false) ──→ Ok(envelope)
//! register() ──┼── reply (err=true)  ──→ Err(Server { message })
//!              └── deadline elapses  ──→ Err(Timeout { verb, data, id })
//! ```
//!
//! Removing the entry from the table is the arbitration point: whichever
//! path removes it settles the request, and the others find nothing. The
//! winner also aborts the timer task, so nothing lingers after settlement.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use cardlink_protocol::{InboundEnvelope, Payload, RequestId, Verb};
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio::time::Instant;

use crate::ClientError;

type Reply = Result<InboundEnvelope, ClientError>;
type PendingTable = HashMap<RequestId, PendingRequest>;

/// One in-flight request.
struct PendingRequest {
    verb: Verb,
    data: Payload,
    created_at: Instant,
    reply: oneshot::Sender<Reply>,
    timer: AbortHandle,
}

impl PendingRequest {
    fn settle(self, result: Reply) {
        self.timer.abort();
        // The caller may have stopped waiting; that's fine.
        let _ = self.reply.send(result);
    }
}

/// Tracks in-flight requests and enforces the per-request deadline.
pub struct RequestCorrelator {
    pending: Arc<Mutex<PendingTable>>,
    timeout: Duration,
}

impl RequestCorrelator {
    pub fn new(timeout: Duration) -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Registers a new request under a fresh id and arms its timer.
    ///
    /// The entry exists before this returns, so a reply can never race
    /// ahead of its registration. Sending the frame is the caller's job.
    pub fn register(&self, verb: Verb, data: Payload) -> ReplyHandle {
        let (tx, rx) = oneshot::channel();
        let mut pending = lock(&self.pending);

        let mut request_id = RequestId::generate();
        while pending.contains_key(&request_id) {
            request_id = RequestId::generate();
        }

        let timer = tokio::spawn(expire(
            Arc::clone(&self.pending),
            request_id.clone(),
            self.timeout,
        ))
        .abort_handle();

        tracing::debug!(%request_id, %verb, "request registered");
        pending.insert(
            request_id.clone(),
            PendingRequest {
                verb,
                data,
                created_at: Instant::now(),
                reply: tx,
                timer,
            },
        );

        ReplyHandle { request_id, rx }
    }

    /// Settles a request successfully. Returns `false` if nothing was
    /// pending under that id (already settled, or never ours).
    pub fn resolve(&self, request_id: &RequestId, envelope: InboundEnvelope) -> bool {
        match self.take(request_id) {
            Some(request) => {
                tracing::debug!(
                    %request_id,
                    verb = %request.verb,
                    elapsed_ms = request.created_at.elapsed().as_millis() as u64,
                    "request resolved"
                );
                request.settle(Ok(envelope));
                true
            }
            None => {
                tracing::debug!(%request_id, "reply for unknown request dropped");
                false
            }
        }
    }

    /// Settles a request with an error. Returns `false` if nothing was
    /// pending under that id.
    pub fn reject(&self, request_id: &RequestId, error: ClientError) -> bool {
        match self.take(request_id) {
            Some(request) => {
                tracing::debug!(%request_id, verb = %request.verb, %error, "request rejected");
                request.settle(Err(error));
                true
            }
            None => false,
        }
    }

    /// Rejects every pending request with [`ClientError::Closed`].
    pub fn close_all(&self) {
        let drained: Vec<_> = lock(&self.pending).drain().collect();
        if !drained.is_empty() {
            tracing::debug!(count = drained.len(), "rejecting pending requests on close");
        }
        for (_, request) in drained {
            request.settle(Err(ClientError::Closed));
        }
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    pub fn is_pending(&self, request_id: &RequestId) -> bool {
        lock(&self.pending).contains_key(request_id)
    }

    fn take(&self, request_id: &RequestId) -> Option<PendingRequest> {
        lock(&self.pending).remove(request_id)
    }
}

impl std::fmt::Debug for RequestCorrelator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCorrelator")
            .field("pending", &self.pending_count())
            .field("timeout", &self.timeout)
            .finish()
    }
}

async fn expire(pending: Arc<Mutex<PendingTable>>, request_id: RequestId, timeout: Duration) {
    tokio::time::sleep(timeout).await;

    let Some(request) = lock(&pending).remove(&request_id) else {
        return;
    };
    tracing::warn!(%request_id, verb = %request.verb, ?timeout, "request timed out");

    // Not `settle`: aborting our own task here would be pointless.
    let error = ClientError::Timeout {
        verb: request.verb,
        data: request.data,
        request_id,
        timeout,
    };
    let _ = request.reply.send(Err(error));
}

// A panic while holding the table can only come from a bug in this module;
// the map itself is still consistent, so keep going with it.
fn lock(pending: &Mutex<PendingTable>) -> MutexGuard<'_, PendingTable> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The caller's end of a registered request.
#[derive(Debug)]
pub struct ReplyHandle {
    request_id: RequestId,
    rx: oneshot::Receiver<Reply>,
}

impl ReplyHandle {
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// Waits for the request to settle.
    ///
    /// Dropping the handle instead does not cancel the request; its entry
    /// stays pending until a reply or the deadline removes it.
    pub async fn wait(self) -> Result<InboundEnvelope, ClientError> {
        self.rx.await.unwrap_or(Err(ClientError::Closed))
    }
}
