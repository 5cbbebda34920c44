use crate::backend::{ConsumerBackend, ProducerBackend};
use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::message::Message;
use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer as RdkafkaConsumer, StreamConsumer as RdkafkaStreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::{BorrowedMessage as RdkafkaBorrowedMessage, Message as RdkafkaMessage};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer as RdkafkaProducer};
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::util::Timeout;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, info};

/// How long `subscribe` waits for topic metadata.
pub const DEFAULT_METADATA_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a send waits for room in the local producer queue.
pub const DEFAULT_QUEUE_TIMEOUT: Duration = Duration::from_secs(5);

fn client_config(config: &ConnectionConfig) -> ClientConfig {
    let mut client_config = ClientConfig::new();
    for (key, value) in config.iter() {
        client_config.set(key, value);
    }
    client_config
}

/// Consumer backed by an `rdkafka` [`StreamConsumer`](RdkafkaStreamConsumer).
pub struct KafkaConsumer {
    consumer: Arc<RdkafkaStreamConsumer>,
    topic: OnceLock<String>,
    metadata_timeout: Duration,
}

impl KafkaConsumer {
    /// Create the consumer. No network round trip happens here; broker
    /// reachability shows up on `subscribe`.
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        let mut config = config.clone();
        config.set_default("enable.partition.eof", "false");

        let consumer: RdkafkaStreamConsumer = client_config(&config)
            .create()
            .map_err(|e| Error::Connection(format!("Failed to create consumer: {e}")))?;

        Ok(Self {
            consumer: Arc::new(consumer),
            topic: OnceLock::new(),
            metadata_timeout: DEFAULT_METADATA_TIMEOUT,
        })
    }

    pub fn with_metadata_timeout(mut self, timeout: Duration) -> Self {
        self.metadata_timeout = timeout;
        self
    }

    fn topic(&self) -> &str {
        self.topic.get().map(String::as_str).unwrap_or_default()
    }

    fn to_message(msg: &RdkafkaBorrowedMessage<'_>) -> Message {
        Message {
            topic: msg.topic().to_string(),
            key: msg.key().map(|k| k.to_vec()),
            value: msg.payload().map(|p| p.to_vec()).unwrap_or_default(),
            partition: Some(msg.partition()),
            offset: Some(msg.offset()),
            timestamp: msg.timestamp().to_millis(),
        }
    }
}

/// Fail early for topics the cluster does not know about. `subscribe`
/// itself is lazy and would otherwise wait forever. Blocks for up to
/// `timeout`.
fn resolve_topic(consumer: &RdkafkaStreamConsumer, topic: &str, timeout: Duration) -> Result<()> {
    let metadata = consumer
        .fetch_metadata(Some(topic), Timeout::After(timeout))
        .map_err(|e| Error::subscription(topic, format!("Failed to fetch metadata: {e}")))?;

    let Some(found) = metadata.topics().iter().find(|t| t.name() == topic) else {
        return Err(Error::subscription(topic, "Topic not found in metadata"));
    };
    if let Some(err) = found.error() {
        return Err(Error::subscription(topic, RDKafkaErrorCode::from(err)));
    }
    if found.partitions().is_empty() {
        return Err(Error::subscription(topic, "Topic has no partitions"));
    }

    debug!(
        "Resolved topic '{}' with {} partitions",
        topic,
        found.partitions().len()
    );
    Ok(())
}

#[async_trait]
impl ConsumerBackend for KafkaConsumer {
    async fn subscribe(&self, topic: &str) -> Result<()> {
        let consumer = Arc::clone(&self.consumer);
        let owned_topic = topic.to_string();
        let timeout = self.metadata_timeout;
        tokio::task::spawn_blocking(move || resolve_topic(&consumer, &owned_topic, timeout))
            .await
            .map_err(|e| Error::subscription(topic, format!("Metadata lookup aborted: {e}")))??;

        self.consumer
            .subscribe(&[topic])
            .map_err(|e| Error::subscription(topic, format!("Failed to subscribe to topic: {e}")))?;

        let _ = self.topic.set(topic.to_string());
        info!("Subscribed to topic '{}'", topic);
        Ok(())
    }

    async fn recv(&self) -> Result<Message> {
        loop {
            match self.consumer.recv().await {
                Ok(msg) => return Ok(Self::to_message(&msg)),
                Err(KafkaError::PartitionEOF(partition)) => {
                    debug!("Reached end of partition {}", partition);
                }
                Err(e) => {
                    return Err(Error::subscription(
                        self.topic(),
                        format!("Error receiving message: {e}"),
                    ))
                }
            }
        }
    }

    fn shutdown(&self) {
        self.consumer.unsubscribe();
        debug!("Unsubscribed from topic '{}'", self.topic());
    }
}

/// Producer backed by an `rdkafka` [`FutureProducer`].
pub struct KafkaProducer {
    producer: FutureProducer,
    queue_timeout: Duration,
}

impl KafkaProducer {
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        let producer: FutureProducer = client_config(config)
            .create()
            .map_err(|e| Error::Connection(format!("Failed to create producer: {e}")))?;

        Ok(Self {
            producer,
            queue_timeout: DEFAULT_QUEUE_TIMEOUT,
        })
    }

    pub fn with_queue_timeout(mut self, timeout: Duration) -> Self {
        self.queue_timeout = timeout;
        self
    }

    /// librdkafka latches fatal errors on the client handle; once set, the
    /// producer cannot be used again.
    fn classify(&self, err: String) -> Error {
        match self.producer.client().fatal_error() {
            Some((code, reason)) => Error::Connection(format!("{code}: {reason} ({err})")),
            None => Error::Delivery(err),
        }
    }
}

#[async_trait]
impl ProducerBackend for KafkaProducer {
    async fn send_batch(&self, batch: &[Message]) -> Result<()> {
        let mut futures = Vec::with_capacity(batch.len());
        for message in batch {
            let mut record: FutureRecord<'_, [u8], [u8]> =
                FutureRecord::to(&message.topic).payload(message.value.as_slice());
            if let Some(key) = &message.key {
                record = record.key(key.as_slice());
            }
            futures.push(self.producer.send(record, Timeout::After(self.queue_timeout)));
        }

        // Wait for every message so the caller learns about all rejections
        let mut failed = 0usize;
        let mut first_error: Option<KafkaError> = None;
        for future in futures {
            if let Err((err, _)) = future.await {
                failed += 1;
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            None => Ok(()),
            Some(err) => Err(self.classify(format!(
                "{failed} of {} messages rejected: {err}",
                batch.len()
            ))),
        }
    }

    fn flush(&self, timeout: Duration) -> Result<()> {
        self.producer
            .flush(Timeout::After(timeout))
            .map_err(|e| self.classify(format!("Failed to flush producer: {e}")))
    }
}
