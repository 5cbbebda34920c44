//! `kfktools consume`: print the messages of one topic.

use anyhow::Context;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use clap::{Args, ValueEnum};
use kfktools_client::{ConsumerClient, Error, Message};
use serde::Serialize;
use std::io::Write;
use tracing::info;

#[derive(Args, Clone, Debug)]
pub struct ConsumeArgs {
    /// Topic to consume from
    pub topic: String,

    /// Stop after this many messages (default: run until interrupted)
    #[arg(long)]
    pub max_messages: Option<u64>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Print the key before the value, separated by this character (text format only)
    #[arg(long)]
    pub key_delimiter: Option<char>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// One line per message, payload decoded as UTF-8 (lossy)
    Text,
    /// One JSON object per message, key and value base64-encoded
    Json,
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    topic: &'a str,
    partition: Option<i32>,
    offset: Option<i64>,
    timestamp: Option<i64>,
    key: Option<String>,
    value: String,
}

/// Print messages of `args.topic` to `out` until `max_messages` is reached
/// or the client is closed. Returns the number of messages printed.
pub async fn run<W: Write>(
    client: &ConsumerClient,
    args: &ConsumeArgs,
    out: &mut W,
) -> anyhow::Result<u64> {
    let mut subscription = match client.listen_to(&args.topic).await {
        Ok(subscription) => subscription,
        Err(Error::Closed) => {
            info!("Consumer closed before subscribing to '{}'", args.topic);
            return Ok(0);
        }
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to subscribe to topic '{}'", args.topic))
        }
    };
    info!("Consuming from topic '{}'", args.topic);

    let mut count = 0u64;
    while args.max_messages.map_or(true, |max| count < max) {
        let message = match subscription.next_message().await {
            Ok(message) => message,
            Err(Error::Closed) => {
                info!("Consumer closed after {} messages", count);
                break;
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to receive message from topic '{}'", args.topic)
                })
            }
        };

        write_message(out, &message, args)?;
        out.flush()?;
        count += 1;
    }

    Ok(count)
}

fn write_message<W: Write>(out: &mut W, message: &Message, args: &ConsumeArgs) -> anyhow::Result<()> {
    match args.format {
        OutputFormat::Text => {
            let value = String::from_utf8_lossy(&message.value);
            match (args.key_delimiter, message.key()) {
                (Some(delimiter), Some(key)) => {
                    writeln!(out, "{}{delimiter}{value}", String::from_utf8_lossy(key))?
                }
                (Some(delimiter), None) => writeln!(out, "{delimiter}{value}")?,
                (None, _) => writeln!(out, "{value}")?,
            }
        }
        OutputFormat::Json => {
            let record = JsonRecord {
                topic: &message.topic,
                partition: message.partition,
                offset: message.offset,
                timestamp: message.timestamp,
                key: message.key().map(|k| STANDARD.encode(k)),
                value: STANDARD.encode(&message.value),
            };
            serde_json::to_writer(&mut *out, &record)?;
            writeln!(out)?;
        }
    }
    Ok(())
}
