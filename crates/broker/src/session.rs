// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A `Session` is the broker's handle on one accepted TCP connection: its
//! identity, last-seen timestamp, and outbound write queue. The session owns
//! its transport exclusively; the registry only holds a lookup reference.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::envelope::{epoch_ms, Envelope, Role};
use crate::error::SendError;

pub struct Session {
    pub client_id: String,
    pub role: Role,
    pub registered_at: Instant,
    pub(crate) last_seen_ms: AtomicI64,
    outbound_tx: mpsc::UnboundedSender<Envelope>,
    /// Cancelled by the heartbeat monitor to force-close a stale connection,
    /// and by the connection's own teardown path so the writer task exits.
    pub cancel: CancellationToken,
}

impl Session {
    pub fn new(client_id: String, role: Role, outbound_tx: mpsc::UnboundedSender<Envelope>) -> Arc<Self> {
        Arc::new(Self {
            client_id,
            role,
            registered_at: Instant::now(),
            last_seen_ms: AtomicI64::new(epoch_ms()),
            outbound_tx,
            cancel: CancellationToken::new(),
        })
    }

    /// Record that an envelope (including a `heartbeat`) was just received.
    pub fn touch(&self) {
        self.last_seen_ms.store(epoch_ms(), Ordering::Relaxed);
    }

    pub fn last_seen_ms(&self) -> i64 {
        self.last_seen_ms.load(Ordering::Relaxed)
    }

    /// Place an envelope on this session's write queue. The write itself
    /// happens on the session's writer task, never under the router's lock.
    pub fn send(&self, env: Envelope) -> Result<(), SendError> {
        self.outbound_tx.send(env).map_err(|_| SendError::NotConnected)
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
