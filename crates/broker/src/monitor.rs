// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic sweep that drops sessions which have gone quiet past
//! `client_timeout_secs` and runs the matching router teardown.

use std::sync::Arc;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::BrokerConfig;
use crate::envelope::Role;
use crate::registry::Registry;
use crate::router::Router;

pub async fn run(registry: Arc<Registry>, router: Arc<Router>, config: Arc<BrokerConfig>, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(config.heartbeat_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => sweep(&registry, &router, config.client_timeout_secs).await,
            _ = shutdown.cancelled() => {
                tracing::debug!("heartbeat monitor shutting down");
                return;
            }
        }
    }
}

async fn sweep(registry: &Arc<Registry>, router: &Arc<Router>, timeout_secs: u64) {
    for (client_id, role) in registry.stale_sessions(timeout_secs).await {
        tracing::info!(client_id = client_id.as_str(), %role, "client timed out");
        if let Some(session) = registry.remove(&client_id).await {
            session.cancel.cancel();
        }
        match role {
            Role::Consumer => router.on_consumer_loss(&client_id).await,
            Role::Producer => router.on_producer_loss(&client_id).await,
        }
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
