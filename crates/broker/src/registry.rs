// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Indexes live sessions by client id and by role. Grounded on the
//! `RwLock<HashMap<String, ..>>` registry shape this workspace already uses
//! for its agent pod registry and mux session table.

use std::collections::HashMap;
use std::time::Instant;

use std::sync::Arc;
use tokio::sync::RwLock;

use crate::envelope::Role;
use crate::session::Session;

#[derive(Default)]
pub struct Registry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, client_id: &str) -> bool {
        self.sessions.read().await.contains_key(client_id)
    }

    /// Register a new session. Callers must already have checked
    /// [`Registry::contains`] under the same registration handshake; a
    /// duplicate id silently replaces the prior entry, which callers must
    /// not rely on (the broker rejects duplicate registrations before this
    /// is ever reached).
    pub async fn insert(&self, session: Arc<Session>) {
        self.sessions.write().await.insert(session.client_id.clone(), session);
    }

    pub async fn remove(&self, client_id: &str) -> Option<Arc<Session>> {
        self.sessions.write().await.remove(client_id)
    }

    pub async fn get(&self, client_id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(client_id).cloned()
    }

    /// All live consumer sessions, with their registration time for the
    /// router's shortest-queue-with-earliest-registration tiebreak.
    pub async fn consumer_sessions(&self) -> Vec<(String, Instant)> {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| s.role == Role::Consumer)
            .map(|s| (s.client_id.clone(), s.registered_at))
            .collect()
    }

    pub async fn consumer_ids(&self) -> Vec<String> {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| s.role == Role::Consumer)
            .map(|s| s.client_id.clone())
            .collect()
    }

    /// Sessions whose `lastSeen` lags by more than `timeout_secs`.
    pub async fn stale_sessions(&self, timeout_secs: u64) -> Vec<(String, Role)> {
        let cutoff = crate::envelope::epoch_ms() - (timeout_secs as i64 * 1000);
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| s.last_seen_ms() < cutoff)
            .map(|s| (s.client_id.clone(), s.role))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
