// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `coop broker` — start a broker in standalone mode and block until a
//! shutdown signal arrives.

use tokio_util::sync::CancellationToken;

use coop_broker::BrokerConfig;

#[derive(Debug, clap::Args)]
pub struct BrokerArgs {
    #[command(flatten)]
    pub config: BrokerConfig,
}

pub async fn run(args: BrokerArgs) -> anyhow::Result<()> {
    args.config.validate()?;
    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());
    coop_broker::run(args.config, shutdown).await
}

fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
        let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).ok();
        tokio::select! {
            _ = async {
                if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await }
            } => tracing::info!("received SIGTERM"),
            _ = async {
                if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await }
            } => tracing::info!("received SIGINT"),
        }
        shutdown.cancel();
    });
}
