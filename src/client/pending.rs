use crate::protocol::{Reply, RequestId};
use std::collections::HashMap;
use tokio::sync::oneshot;

/// Tracks pending requests waiting for responses
///
/// Maps request ids to oneshot channels. When a response arrives, the
/// channel delivers it to the waiting future and the entry is removed, so
/// every response is delivered at most once.
pub(super) struct PendingRequests {
    // ---
    requests: HashMap<RequestId, oneshot::Sender<Reply>>,
}

impl PendingRequests {
    // ---

    /// Create a new empty pending requests tracker
    pub fn new() -> Self {
        // ---
        Self {
            requests: HashMap::new(),
        }
    }

    /// Register a new pending request
    ///
    /// Returns a receiver that will be notified when the response arrives.
    pub fn register(&mut self, request_id: RequestId) -> oneshot::Receiver<Reply> {
        // ---
        let (tx, rx) = oneshot::channel();
        self.requests.insert(request_id, tx);
        rx
    }

    /// Complete a pending request with its reply
    ///
    /// Returns true if the request id was found and the reply was delivered.
    pub fn complete(&mut self, request_id: RequestId, reply: Reply) -> bool {
        // ---
        if let Some(tx) = self.requests.remove(&request_id) {
            // Receiver may be gone if the caller timed out or was dropped
            let _ = tx.send(reply);
            true
        } else {
            false
        }
    }

    /// Remove a pending request without delivering a reply
    ///
    /// Used for timeout and send-failure cleanup.
    pub fn remove(&mut self, request_id: RequestId) -> bool {
        // ---
        self.requests.remove(&request_id).is_some()
    }

    /// Drop every pending request; waiting callers observe a closed channel.
    pub fn clear(&mut self) {
        // ---
        self.requests.clear();
    }

    /// Get the number of pending requests
    pub fn len(&self) -> usize {
        // ---
        self.requests.len()
    }
}
