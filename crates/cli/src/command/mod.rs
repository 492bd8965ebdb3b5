// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The four subcommands: standalone broker, producer, consumer, and both
//! roles in one process.

pub mod broker;
pub mod both;
pub mod consume;
pub mod produce;

use coop_broker_client::ClientConfig;

/// Client-side tunables shared by every subcommand that opens a
/// `BrokerClient`, flattened into each subcommand's `clap::Args`.
#[derive(Debug, Clone, clap::Args)]
pub struct ClientArgs {
    /// Base delay before the first reconnect attempt, in milliseconds;
    /// doubles on each subsequent attempt.
    #[arg(long, env = "COOP_CLIENT_RECONNECT_DELAY_MS", default_value = "1000")]
    pub reconnect_delay_ms: u64,

    /// Maximum number of reconnect attempts before giving up.
    #[arg(long, env = "COOP_CLIENT_MAX_RECONNECT_ATTEMPTS", default_value = "10")]
    pub max_reconnect_attempts: u32,
}

impl ClientArgs {
    pub fn apply(&self, config: &mut ClientConfig) {
        config.reconnect_delay_ms = self.reconnect_delay_ms;
        config.max_reconnect_attempts = self.max_reconnect_attempts;
    }
}
