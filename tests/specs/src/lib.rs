// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end test harness: spawns a real broker in-process and drives it
//! with real [`BrokerClient`] instances over loopback TCP, rather than a
//! subprocess. Exercises the same wire codec and router the standalone
//! `coop-broker` binary runs, without the cost of spawning a process per
//! test.

use std::sync::atomic::{AtomicU16, Ordering};

use coop_broker::BrokerConfig;
use coop_broker::envelope::{ClarificationInput, Role, Urgency, YapMessage, epoch_ms};
use coop_broker_client::{BrokerClient, ClientConfig, ClientEvent};
use tokio_util::sync::CancellationToken;

static NEXT_PORT: AtomicU16 = AtomicU16::new(19_500);

/// Hand out a fresh loopback port per test so scenarios can run concurrently
/// without colliding on a single listener.
pub fn next_port() -> u16 {
    NEXT_PORT.fetch_add(1, Ordering::Relaxed)
}

/// Start a broker on `port` with heartbeat/timeout effectively disabled, so
/// scenario tests aren't racing the monitor sweep. Returns a token that
/// shuts the broker down on `cancel()`.
pub async fn spawn_broker(port: u16) -> CancellationToken {
    let mut config = BrokerConfig::default();
    config.port = port;
    config.heartbeat_secs = 3600;
    config.client_timeout_secs = 7200;
    let shutdown = CancellationToken::new();
    let broker_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = coop_broker::run(config, broker_shutdown).await;
    });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    shutdown
}

/// Connect a producer-role client and return it with its event channel.
pub async fn producer(port: u16, id: &str) -> (std::sync::Arc<BrokerClient>, tokio::sync::mpsc::UnboundedReceiver<ClientEvent>) {
    let mut config = ClientConfig::new(id, Role::Producer);
    config.port = port;
    let (client, events) = BrokerClient::new(config);
    client.connect().await.expect("producer connects");
    (client, events)
}

/// Connect a consumer-role client and return it with its event channel,
/// having already drained the initial `sync` event.
pub async fn consumer(port: u16, id: &str) -> (std::sync::Arc<BrokerClient>, tokio::sync::mpsc::UnboundedReceiver<ClientEvent>) {
    let mut config = ClientConfig::new(id, Role::Consumer);
    config.port = port;
    let (client, mut events) = BrokerClient::new(config);
    client.connect().await.expect("consumer connects");
    assert!(matches!(events.recv().await.unwrap(), ClientEvent::Sync));
    (client, events)
}

pub fn clarification(id: &str, question: &str, urgency: Urgency, timestamp: i64) -> ClarificationInput {
    ClarificationInput { id: id.to_string(), question: question.to_string(), context: None, urgency, timestamp }
}

pub fn yap(id: &str, message: &str, timestamp: i64) -> YapMessage {
    YapMessage { id: id.to_string(), message: message.to_string(), mode: None, category: None, task_context: None, timestamp }
}

pub fn now_ms() -> i64 {
    epoch_ms()
}
