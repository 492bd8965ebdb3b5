// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `coop consume` — attach-only consumer session. Never spawns a broker
//! (spawning is a producer-side concern); renders incoming clarifications/
//! yaps and reads the human's answers back from stdin. The real readline
//! front-end lives elsewhere; this is the bare terminal loop needed to
//! exercise the core end to end.

use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};

use coop_broker::BrokerConfig;
use coop_broker_client::{BrokerClient, ClientConfig, ClientEvent};

use crate::command::ClientArgs;

#[derive(Debug, clap::Args)]
pub struct ConsumeArgs {
    #[command(flatten)]
    pub broker: BrokerConfig,

    #[command(flatten)]
    pub client: ClientArgs,

    /// Client id to register with; defaults to a fresh uuid.
    #[arg(long)]
    pub client_id: Option<String>,
}

pub async fn run(args: ConsumeArgs) -> anyhow::Result<()> {
    let client_id = args.client_id.unwrap_or_else(|| format!("consumer-{}", uuid::Uuid::new_v4()));
    let mut config = ClientConfig::new(client_id, coop_broker::envelope::Role::Consumer);
    config.host = args.broker.host.clone();
    config.port = args.broker.port;
    args.client.apply(&mut config);

    let (client, mut events) = BrokerClient::new(config);
    client.connect().await?;

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    while let Some(event) = events.recv().await {
        match event {
            ClientEvent::Clarification(req) => {
                render_clarification(&req);
                if req.status != coop_broker::envelope::ClarificationStatus::Timeout {
                    if let Some(answer) = lines.next_line().await? {
                        let _ = client.send_response(req.id.clone(), answer);
                    }
                }
            }
            ClientEvent::Yap(yap) => println!("yap: {}", yap.message),
            ClientEvent::Sync => {}
            ClientEvent::Disconnected | ClientEvent::MaxReconnectAttemptsReached => break,
        }
    }

    client.shutdown();
    Ok(())
}

fn render_clarification(req: &coop_broker::envelope::ClarificationRequest) {
    println!("[{:?}] {}", req.urgency, req.question);
    if let Some(context) = &req.context {
        println!("  context: {context}");
    }
    if req.status == coop_broker::envelope::ClarificationStatus::Timeout {
        println!("  (source disconnected, no answer needed)");
        return;
    }
    print!("> ");
    let _ = std::io::stdout().flush();
}
