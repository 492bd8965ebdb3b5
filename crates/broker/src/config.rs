// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;

/// Tunables for a single broker instance. Every field has a documented
/// default and can be overridden by flag or `COOP_BROKER_*` environment
/// variable.
#[derive(Debug, Clone, Parser)]
#[command(name = "coop-broker", version, about = "Message broker for clarification and yap routing.")]
pub struct BrokerConfig {
    /// TCP port to listen on.
    #[arg(long, env = "COOP_BROKER_PORT", default_value = "8765")]
    pub port: u16,

    /// Host address to bind to.
    #[arg(long, env = "COOP_BROKER_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Per-consumer clarification queue capacity.
    #[arg(long, env = "COOP_BROKER_MAX_CLARIFICATION_QUEUE", default_value = "10")]
    pub max_clarification_queue: usize,

    /// Per-consumer yap reorder buffer flush delay, in milliseconds.
    #[arg(long, env = "COOP_BROKER_YAP_BUFFER_MS", default_value = "200")]
    pub yap_buffer_ms: u64,

    /// Expected client heartbeat interval, in seconds.
    #[arg(long, env = "COOP_BROKER_HEARTBEAT_SECS", default_value = "5")]
    pub heartbeat_secs: u64,

    /// Staleness threshold past which a session is force-closed, in seconds.
    #[arg(long, env = "COOP_BROKER_CLIENT_TIMEOUT_SECS", default_value = "15")]
    pub client_timeout_secs: u64,

    /// Log format (json or text).
    #[arg(long, env = "COOP_BROKER_LOG_FORMAT", default_value = "json")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "COOP_BROKER_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            port: 8765,
            host: "127.0.0.1".to_string(),
            max_clarification_queue: 10,
            yap_buffer_ms: 200,
            heartbeat_secs: 5,
            client_timeout_secs: 15,
            log_format: "json".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl BrokerConfig {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_clarification_queue == 0 {
            anyhow::bail!("--max-clarification-queue must be at least 1");
        }
        if self.client_timeout_secs <= self.heartbeat_secs {
            anyhow::bail!("--client-timeout-secs must be greater than --heartbeat-secs");
        }
        if self.yap_buffer_ms == 0 {
            anyhow::bail!("--yap-buffer-ms must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
