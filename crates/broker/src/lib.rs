// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message broker connecting AI-agent producers (`mcp-server`) and
//! human-operated consumer terminals (`cli`) for synchronous clarification
//! requests and asynchronous yap notifications.

pub mod config;
pub mod envelope;
pub mod error;
pub mod monitor;
pub mod registry;
pub mod router;
pub mod server;
pub mod session;
pub mod wire;

pub use config::BrokerConfig;
pub use server::Broker;

use tokio_util::sync::CancellationToken;

/// Run a broker to completion, cancelling `shutdown` to stop it.
pub async fn run(config: BrokerConfig, shutdown: CancellationToken) -> anyhow::Result<()> {
    config.validate()?;
    let broker = Broker::new(config);
    broker.run(shutdown).await
}
