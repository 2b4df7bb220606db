//! Pending-call tracking and correlation id assignment.
//!
//! Every outbound call registers itself here before it is sent; every
//! inbound response is matched back through [`Correlator::complete`]. The
//! table is shared between the send path and each pooled connection's
//! inbound handler.
//!
//! Correlation ids come from a monotonically increasing counter, so an id
//! is never reused while another call is pending.
//!
//! A pending entry is removed only when its response arrives. If the
//! owning connection dies first, the entry stays in the table and the
//! call's future never settles; that gap is part of the contract (the
//! closure itself is announced on the event bus).

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::trace;

use crate::identifiers::CorrelationId;

// ============================================================================
// Types
// ============================================================================

/// A call awaiting its response.
struct PendingCall {
    /// The method path, kept for event annotation.
    path: String,
    /// Resolves the caller's future.
    resolve: oneshot::Sender<Value>,
}

// ============================================================================
// Correlator
// ============================================================================

/// Assigns correlation ids and matches responses to pending calls.
#[derive(Default)]
pub(crate) struct Correlator {
    pending: Mutex<FxHashMap<CorrelationId, PendingCall>>,
    next_id: AtomicU64,
}

impl Correlator {
    /// Creates an empty correlator.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new pending call for `path`.
    ///
    /// Returns the assigned correlation id and the receiver the call's
    /// future awaits on.
    pub fn register(&self, path: &str) -> (CorrelationId, oneshot::Receiver<Value>) {
        let id = CorrelationId::from_u64(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let (resolve, response) = oneshot::channel();

        self.pending.lock().insert(
            id,
            PendingCall {
                path: path.to_owned(),
                resolve,
            },
        );

        trace!(id = %id, path, "Registered pending call");
        (id, response)
    }

    /// Resolves the pending call registered under `id` with `result`.
    ///
    /// Removes the entry and returns its method path, or `None` when no
    /// call is pending under that id (e.g. a duplicate response), in
    /// which case nothing is resolved.
    pub fn complete(&self, id: CorrelationId, result: Value) -> Option<String> {
        let call = self.pending.lock().remove(&id)?;

        // The receiver may be gone if the caller dropped its future.
        let _ = call.resolve.send(result);

        trace!(id = %id, path = %call.path, "Resolved pending call");
        Some(call.path)
    }

    /// Returns the number of calls currently pending.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

// ============================================================================
// Tests
// ============================================================================
