//! `kfktools produce`: send input lines as messages.

use crate::input::MessageReader;
use anyhow::Context;
use clap::Args;
use kfktools_client::{Message, ProducerClient};
use kfktools_syntax::SyntaxError;
use std::io::BufRead;
use std::path::PathBuf;
use tracing::{debug, error};

#[derive(Args, Clone, Debug)]
pub struct ProduceArgs {
    /// Topic to send to
    pub topic: String,

    /// Split each line into key and value at the first occurrence of this character
    #[arg(long)]
    pub key_delimiter: Option<char>,

    /// Number of messages per batch
    #[arg(long, default_value = "100")]
    pub batch_size: usize,

    /// Read messages from this file instead of stdin
    #[arg(long)]
    pub input: Option<PathBuf>,
}

/// Send every record of `input` to `args.topic`, `batch_size` at a time.
///
/// Input is checked batch by batch: when a record is malformed, the batches
/// before it have been sent and the one containing it has not.
pub async fn run<R: BufRead>(
    client: &ProducerClient,
    args: &ProduceArgs,
    input: R,
) -> anyhow::Result<u64> {
    let batch_size = args.batch_size.max(1);
    let mut batch: Vec<Message> = Vec::with_capacity(batch_size);
    let mut sent = 0u64;

    for message in MessageReader::new(input, args.topic.as_str(), args.key_delimiter) {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                if let Some(syntax) = e.downcast_ref::<SyntaxError>() {
                    error!(
                        "Rejected input at {}: {}",
                        syntax.location(),
                        syntax.message()
                    );
                }
                return Err(e.context(format!("Invalid input for topic '{}'", args.topic)));
            }
        };

        batch.push(message);
        if batch.len() >= batch_size {
            sent += send_batch(client, &mut batch).await?;
        }
    }
    if !batch.is_empty() {
        sent += send_batch(client, &mut batch).await?;
    }

    Ok(sent)
}

async fn send_batch(client: &ProducerClient, batch: &mut Vec<Message>) -> anyhow::Result<u64> {
    client
        .send(batch)
        .await
        .with_context(|| format!("Failed to send batch of {} messages", batch.len()))?;

    let count = batch.len() as u64;
    debug!("Sent {} messages", count);
    batch.clear();
    Ok(count)
}
