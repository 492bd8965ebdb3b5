// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::error;

use coop::command::{both, broker, consume, produce};

#[derive(Parser)]
#[command(name = "coop", version, about = "Message broker and producer/consumer client sessions.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Start a broker in standalone mode.
    Broker(broker::BrokerArgs),
    /// Start a producer-role session (attaches or spawns a broker).
    Produce(produce::ProduceArgs),
    /// Start a consumer-role session (attaches only).
    Consume(consume::ConsumeArgs),
    /// Run producer and consumer roles in the same process.
    Both(both::BothArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing();

    let result = match cli.command {
        Commands::Broker(args) => broker::run(args).await,
        Commands::Produce(args) => produce::run(args).await,
        Commands::Consume(args) => consume::run(args).await,
        Commands::Both(args) => both::run(args).await,
    };

    if let Err(e) = result {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
