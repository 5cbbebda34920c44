//! kfktools Library
//!
//! Building blocks of the `kfktools` command-line tool: connection options,
//! the `consume` and `produce` commands, and the line-oriented input format
//! the producer reads.
//!
//! # CLI Usage
//!
//! ```bash
//! # Print every message of a topic, keys included
//! kfktools --brokers localhost:9092 consume events --key-delimiter :
//!
//! # Send one message per line, "key:value"
//! printf 'user_001:login\nuser_002:signup\n' | kfktools produce events --key-delimiter :
//!
//! # Pass any librdkafka property through
//! kfktools -X security.protocol=SSL -X acks=all produce events --input events.txt
//! ```

use clap::Parser;
use kfktools_client::config::{AUTO_OFFSET_RESET, BOOTSTRAP_SERVERS, GROUP_ID};
use kfktools_client::ConnectionConfig;

pub mod consume;
pub mod input;
pub mod produce;

#[derive(Parser, Clone, Debug)]
pub struct ConnectionOpts {
    /// Kafka brokers (comma-separated, e.g., "localhost:9092")
    #[arg(long, env = "KAFKA_BROKERS", default_value = "localhost:9092")]
    pub brokers: String,

    /// Consumer group ID
    #[arg(long, env = "KAFKA_GROUP_ID", default_value = "kfktools")]
    pub group_id: String,

    /// Extra librdkafka property, passed through unchecked (repeatable)
    ///
    /// Overrides the values derived from the other options.
    #[arg(
        short = 'X',
        long = "property",
        value_name = "KEY=VALUE",
        value_parser = parse_property
    )]
    pub properties: Vec<(String, String)>,
}

impl ConnectionOpts {
    pub fn consumer_config(&self) -> ConnectionConfig {
        let mut config = ConnectionConfig::new()
            .with(BOOTSTRAP_SERVERS, &self.brokers)
            .with(GROUP_ID, &self.group_id)
            .with(AUTO_OFFSET_RESET, "earliest");
        config.extend(self.properties.iter().cloned());
        config
    }

    pub fn producer_config(&self) -> ConnectionConfig {
        let mut config = ConnectionConfig::new().with(BOOTSTRAP_SERVERS, &self.brokers);
        config.extend(self.properties.iter().cloned());
        config
    }
}

fn parse_property(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got `{s}`")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<ConnectionOpts, clap::Error> {
        ConnectionOpts::try_parse_from(std::iter::once("kfktools").chain(args.iter().copied()))
    }

    #[test]
    fn test_properties_override_named_options() {
        let opts = parse(&[
            "--brokers",
            "b1:9092,b2:9092",
            "-X",
            "group.id=from-property",
            "--property",
            "auto.offset.reset=latest",
        ])
        .unwrap();

        let consumer = opts.consumer_config();
        assert_eq!(consumer.get(BOOTSTRAP_SERVERS), Some("b1:9092,b2:9092"));
        assert_eq!(consumer.get(GROUP_ID), Some("from-property"));
        assert_eq!(consumer.get(AUTO_OFFSET_RESET), Some("latest"));

        let producer = opts.producer_config();
        assert_eq!(producer.get(BOOTSTRAP_SERVERS), Some("b1:9092,b2:9092"));
        assert_eq!(producer.get(AUTO_OFFSET_RESET), Some("latest"));
    }

    #[test]
    fn test_property_value_may_contain_equals() {
        let opts = parse(&["-X", "sasl.jaas.config=a=b"]).unwrap();
        assert_eq!(
            opts.properties,
            vec![("sasl.jaas.config".to_string(), "a=b".to_string())]
        );
    }

    #[test]
    fn test_malformed_property_rejected() {
        assert!(parse(&["-X", "no-equals-sign"]).is_err());
        assert!(parse(&["-X", "=value"]).is_err());
    }
}
