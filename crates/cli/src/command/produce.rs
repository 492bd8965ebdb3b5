// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `coop produce` — run the broker supervisor (attach-or-spawn), then
//! connect a producer-role client session.
//!
//! The real agent-facing RPC surface that exposes `clarify`/`yap` as tools
//! lives elsewhere; this command is a thin stdin/stdout harness just enough
//! to exercise the broker core end to end. Each line on stdin is one JSON
//! request:
//! `{"question": "...", "context"?, "urgency"?, "timeout_ms"?}` sends a
//! clarification and prints its resolution as one JSON line on stdout;
//! `{"yap": "...", "mode"?, "category"?}` fires a one-way notification.

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};

use coop_broker::BrokerConfig;
use coop_broker::envelope::{ClarificationInput, Urgency, YapMessage, epoch_ms};
use coop_broker_client::{BrokerClient, ClientConfig, ClientError};

use crate::command::ClientArgs;
use crate::supervisor::{self, Ownership};

#[derive(Debug, clap::Args)]
pub struct ProduceArgs {
    #[command(flatten)]
    pub broker: BrokerConfig,

    #[command(flatten)]
    pub client: ClientArgs,

    /// Client id to register with; defaults to a fresh uuid.
    #[arg(long)]
    pub client_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProducerLine {
    Clarification {
        question: String,
        #[serde(default)]
        context: Option<String>,
        #[serde(default)]
        urgency: UrgencyArg,
        #[serde(default = "default_timeout_ms")]
        timeout_ms: u64,
    },
    Yap {
        yap: String,
        #[serde(default)]
        mode: Option<String>,
        #[serde(default)]
        category: Option<String>,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum UrgencyArg {
    Low,
    #[default]
    Medium,
    High,
}

fn default_timeout_ms() -> u64 {
    30_000
}

pub async fn run(args: ProduceArgs) -> anyhow::Result<()> {
    args.broker.validate()?;
    let ownership = supervisor::ensure_broker(args.broker.clone()).await?;

    let client_id = args.client_id.unwrap_or_else(|| format!("producer-{}", uuid::Uuid::new_v4()));
    let mut config = ClientConfig::new(client_id, coop_broker::envelope::Role::Producer);
    config.host = args.broker.host.clone();
    config.port = args.broker.port;
    args.client.apply(&mut config);

    let (client, mut events) = BrokerClient::new(config);
    client.connect().await?;
    tokio::spawn(async move { while events.recv().await.is_some() {} });

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let parsed: Result<ProducerLine, _> = serde_json::from_str(&line);
        match parsed {
            Ok(ProducerLine::Clarification { question, context, urgency, timeout_ms }) => {
                handle_clarification(&client, question, context, urgency, timeout_ms).await;
            }
            Ok(ProducerLine::Yap { yap, mode, category }) => {
                let _ = client.send_yap(YapMessage {
                    id: uuid::Uuid::new_v4().to_string(),
                    message: yap,
                    mode,
                    category,
                    task_context: None,
                    timestamp: epoch_ms(),
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, line = line.as_str(), "could not parse producer input line");
            }
        }
    }

    client.shutdown();
    if let Ownership::Owner(handle) = ownership {
        handle.stop().await;
    }
    Ok(())
}

async fn handle_clarification(
    client: &std::sync::Arc<BrokerClient>,
    question: String,
    context: Option<String>,
    urgency: UrgencyArg,
    timeout_ms: u64,
) {
    let request_id = uuid::Uuid::new_v4().to_string();
    let input = ClarificationInput {
        id: request_id.clone(),
        question,
        context,
        urgency: match urgency {
            UrgencyArg::Low => Urgency::Low,
            UrgencyArg::Medium => Urgency::Medium,
            UrgencyArg::High => Urgency::High,
        },
        timestamp: epoch_ms(),
    };
    if let Err(e) = client.send_clarification(input) {
        print_result(&request_id, Err(e));
        return;
    }
    let result = client.await_reply(&request_id, timeout_ms).await;
    print_result(&request_id, result);
}

fn print_result(request_id: &str, result: Result<String, ClientError>) {
    let line = match result {
        Ok(response) => serde_json::json!({"requestId": request_id, "response": response}),
        Err(e) => serde_json::json!({"requestId": request_id, "response": null, "error": e.to_string()}),
    };
    println!("{line}");
}
