//! Request Correlator
//!
//! Single responsibility: give request/response semantics to a one-way
//! send/receive channel. Assigns correlation ids, tracks in-flight
//! requests, and matches incoming responses back to their waiter.
//!
//! Ids are monotonically increasing and never reused within a client's
//! lifetime; a 32-bit counter outlasts any realistic request volume.
//! Responses may arrive in any order relative to send order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::sync::{oneshot, Mutex};
use tracing::debug;

use crate::error::{ClientError, Result};
use crate::protocol::Response;

/// Pending-request table, keyed by correlation id.
pub(crate) struct Correlator {
    next_id: AtomicU32,
    pending: Mutex<HashMap<u32, oneshot::Sender<Result<Response>>>>,
}

impl Correlator {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU32::new(0),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Produce the next correlation id. Always non-zero.
    pub(crate) fn allocate(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Track a request and hand back the channel its response will
    /// arrive on.
    pub(crate) async fn register(&self, id: u32) -> oneshot::Receiver<Result<Response>> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);
        rx
    }

    /// Route a response to its waiter. Responses for unknown ids
    /// (timed out, duplicate, never sent) are dropped silently.
    pub(crate) async fn resolve(&self, response: Response) -> bool {
        let tx = self.pending.lock().await.remove(&response.id);
        match tx {
            Some(tx) => {
                // A dropped receiver means the caller gave up between
                // timeout and removal; nothing to do.
                let _ = tx.send(Ok(response));
                true
            }
            None => {
                debug!(id = response.id, "dropping response with no pending request");
                false
            }
        }
    }

    /// Forget a request whose caller stopped waiting. A later response
    /// for this id will be dropped.
    pub(crate) async fn forget(&self, id: u32) {
        self.pending.lock().await.remove(&id);
    }

    /// Reject every pending request. Called when the connection leaves
    /// the open state so callers fail fast instead of waiting out their
    /// timeouts.
    pub(crate) async fn fail_all(&self) {
        let mut pending = self.pending.lock().await;
        for (id, tx) in pending.drain() {
            debug!(id = id, "rejecting pending request on disconnect");
            let _ = tx.send(Err(ClientError::ConnectionClosed));
        }
    }
}
