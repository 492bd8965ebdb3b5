// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-client pending-reply table: `awaitReply` registers a one-shot slot
//! keyed by request id; `resolve` is called from the read loop when a
//! matching `response` envelope arrives; `reject_all` fires once on
//! connection loss so no slot waits forever.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::oneshot;

use crate::error::ClientError;

type Slot = oneshot::Sender<Result<String, ClientError>>;

#[derive(Default)]
pub struct PendingReplies {
    slots: Mutex<HashMap<String, Slot>>,
}

impl PendingReplies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, request_id: String) -> oneshot::Receiver<Result<String, ClientError>> {
        let (tx, rx) = oneshot::channel();
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).insert(request_id, tx);
        rx
    }

    /// Deliver a response. A missing slot (already timed out, or answered
    /// twice) is not an error; the reply is simply dropped.
    pub fn resolve(&self, request_id: &str, response: Result<String, ClientError>) {
        if let Some(tx) = self.slots.lock().unwrap_or_else(|e| e.into_inner()).remove(request_id) {
            let _ = tx.send(response);
        }
    }

    /// Reject every outstanding slot, e.g. after the connection drops.
    pub fn reject_all(&self, err: ClientError) {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        for (_, tx) in slots.drain() {
            let _ = tx.send(Err(err.clone()));
        }
    }

    /// Drop a slot without resolving it, used when `awaitReply` itself
    /// times out so a late reply finds nothing to deliver to.
    pub fn remove(&self, request_id: &str) {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).remove(request_id);
    }
}

#[cfg(test)]
#[path = "pending_tests.rs"]
mod tests;
