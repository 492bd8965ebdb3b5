// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `coop both` — run producer and consumer roles in the same process,
//! behind one shared supervisor call. The consumer side behaves exactly
//! like `coop consume`: interactive, reading answers from stdin. The
//! producer side takes its clarifications and yaps as repeatable flags
//! rather than stdin, since stdin is already claimed by the consumer's
//! prompt loop.

use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};

use coop_broker::BrokerConfig;
use coop_broker::envelope::{ClarificationInput, Role, Urgency, YapMessage, epoch_ms};
use coop_broker_client::{BrokerClient, ClientConfig, ClientEvent};

use crate::command::ClientArgs;
use crate::supervisor::{self, Ownership};

#[derive(Debug, clap::Args)]
pub struct BothArgs {
    #[command(flatten)]
    pub broker: BrokerConfig,

    #[command(flatten)]
    pub client: ClientArgs,

    /// A clarification question to send from the producer side; may be
    /// repeated.
    #[arg(long = "ask")]
    pub questions: Vec<String>,

    /// A yap to send from the producer side; may be repeated.
    #[arg(long = "yap")]
    pub yaps: Vec<String>,

    #[arg(long)]
    pub producer_client_id: Option<String>,

    #[arg(long)]
    pub consumer_client_id: Option<String>,
}

pub async fn run(args: BothArgs) -> anyhow::Result<()> {
    args.broker.validate()?;
    let ownership = supervisor::ensure_broker(args.broker.clone()).await?;

    let producer_id =
        args.producer_client_id.unwrap_or_else(|| format!("producer-{}", uuid::Uuid::new_v4()));
    let consumer_id =
        args.consumer_client_id.unwrap_or_else(|| format!("consumer-{}", uuid::Uuid::new_v4()));

    let mut producer_config = ClientConfig::new(producer_id, Role::Producer);
    producer_config.host = args.broker.host.clone();
    producer_config.port = args.broker.port;
    args.client.apply(&mut producer_config);
    let mut consumer_config = ClientConfig::new(consumer_id, Role::Consumer);
    consumer_config.host = args.broker.host.clone();
    consumer_config.port = args.broker.port;
    args.client.apply(&mut consumer_config);

    let (producer, mut producer_events) = BrokerClient::new(producer_config);
    let (consumer, mut consumer_events) = BrokerClient::new(consumer_config);
    producer.connect().await?;
    consumer.connect().await?;
    tokio::spawn(async move { while producer_events.recv().await.is_some() {} });

    let producer_task = {
        let producer = producer.clone();
        tokio::spawn(async move {
            for question in args.questions {
                let request_id = uuid::Uuid::new_v4().to_string();
                let input = ClarificationInput {
                    id: request_id.clone(),
                    question,
                    context: None,
                    urgency: Urgency::Medium,
                    timestamp: epoch_ms(),
                };
                if producer.send_clarification(input).is_ok() {
                    match producer.await_reply(&request_id, 30_000).await {
                        Ok(response) => println!("{}", serde_json::json!({"requestId": request_id, "response": response})),
                        Err(e) => println!("{}", serde_json::json!({"requestId": request_id, "error": e.to_string()})),
                    }
                }
            }
            for yap in args.yaps {
                let _ = producer.send_yap(YapMessage {
                    id: uuid::Uuid::new_v4().to_string(),
                    message: yap,
                    mode: None,
                    category: None,
                    task_context: None,
                    timestamp: epoch_ms(),
                });
            }
        })
    };

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    while let Some(event) = consumer_events.recv().await {
        match event {
            ClientEvent::Clarification(req) => {
                println!("[{:?}] {}", req.urgency, req.question);
                if req.status == coop_broker::envelope::ClarificationStatus::Timeout {
                    println!("  (source disconnected, no answer needed)");
                    continue;
                }
                print!("> ");
                let _ = std::io::stdout().flush();
                if let Some(answer) = lines.next_line().await? {
                    let _ = consumer.send_response(req.id.clone(), answer);
                }
            }
            ClientEvent::Yap(yap) => println!("yap: {}", yap.message),
            ClientEvent::Sync => {}
            ClientEvent::Disconnected | ClientEvent::MaxReconnectAttemptsReached => break,
        }
    }

    let _ = producer_task.await;
    producer.shutdown();
    consumer.shutdown();
    if let Ownership::Owner(handle) = ownership {
        handle.stop().await;
    }
    Ok(())
}
