//! Command-line interface for kfktools
//!
//! # Usage Examples
//!
//! ## Consume
//! ```bash
//! # Follow a topic until Ctrl-C
//! kfktools --brokers localhost:9092 consume user-events
//!
//! # First 10 messages as JSON lines, in a dedicated consumer group
//! kfktools --group-id audit consume user-events --max-messages 10 --format json
//! ```
//!
//! ## Produce
//! ```bash
//! # One message per line, key before the first ':'
//! kfktools produce user-events --key-delimiter : < events.txt
//!
//! # Wait for all replicas to acknowledge
//! kfktools -X acks=all produce user-events --input events.txt --batch-size 500
//! ```
//!
//! Logging goes to stderr and is configured with `RUST_LOG`
//! (e.g. `RUST_LOG=kfktools=debug,kfktools_client=debug`).

use anyhow::Context;
use clap::{Parser, Subcommand};
use kfktools::consume::{self, ConsumeArgs};
use kfktools::produce::{self, ProduceArgs};
use kfktools::ConnectionOpts;
use kfktools_client::{ConsumerClient, ProducerClient};
use std::fs::File;
use std::io::BufReader;
use tracing::info;

#[derive(Parser)]
#[command(name = "kfktools")]
#[command(about = "Consume from and produce to Kafka topics")]
#[command(long_about = None)]
struct Cli {
    /// Kafka connection options
    #[command(flatten)]
    connection: ConnectionOpts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the messages of a topic to stdout
    Consume(ConsumeArgs),
    /// Send lines from stdin or a file as messages
    Produce(ProduceArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize logging; stdout carries the messages
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Consume(args) => {
            let client = ConsumerClient::new(&cli.connection.consumer_config())
                .context("Failed to create Kafka consumer")?;

            let closer = client.close_handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Interrupted, closing consumer");
                    closer.close();
                }
            });

            let mut stdout = std::io::stdout();
            let count = consume::run(&client, &args, &mut stdout).await?;
            client.close();
            info!("Consumed {} messages from '{}'", count, args.topic);
        }
        Commands::Produce(args) => {
            let client = ProducerClient::new(&cli.connection.producer_config())
                .context("Failed to create Kafka producer")?;

            let count = match &args.input {
                Some(path) => {
                    let file = File::open(path)
                        .with_context(|| format!("Failed to open input file {}", path.display()))?;
                    produce::run(&client, &args, BufReader::new(file)).await?
                }
                None => produce::run(&client, &args, std::io::stdin().lock()).await?,
            };

            client.close().context("Failed to flush producer")?;
            info!("Produced {} messages to '{}'", count, args.topic);
        }
    }

    Ok(())
}
