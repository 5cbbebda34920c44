//! In-process broker.
//!
//! Topics are split into partitions; keyed messages are routed by a hash
//! of the key and keyless ones round-robin, so per-key ordering behaves
//! like Kafka's. Consumers start at the earliest offset of every partition
//! and do not share progress with each other.
//!
//! ```
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> kfktools_client::Result<()> {
//! use kfktools_client::memory::MemoryBroker;
//! use kfktools_client::{ConsumerClient, Message, ProducerClient};
//!
//! let broker = MemoryBroker::new();
//! let producer = ProducerClient::with_backend(broker.producer());
//! producer.send(&[Message::keyed("t", "k1", vec![1u8, 2, 3])]).await?;
//!
//! let consumer = ConsumerClient::with_backend(broker.consumer());
//! let mut subscription = consumer.listen_to("t").await?;
//! assert_eq!(subscription.next_message().await?.value, vec![1, 2, 3]);
//! # Ok(())
//! # }
//! ```

use crate::backend::{ConsumerBackend, ProducerBackend};
use crate::error::{Error, Result};
use crate::message::Message;
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Notify;
use tracing::debug;

/// Partition count for topics created implicitly by a produce.
pub const DEFAULT_PARTITIONS: usize = 1;

/// Handle to an in-process broker. Clones share the same topics.
#[derive(Clone)]
pub struct MemoryBroker {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<State>,
    appended: Notify,
}

struct State {
    topics: HashMap<String, Vec<Vec<Message>>>,
    default_partitions: usize,
    max_message_bytes: Option<usize>,
    connected: bool,
    next_keyless: usize,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    topics: HashMap::new(),
                    default_partitions: DEFAULT_PARTITIONS,
                    max_message_bytes: None,
                    connected: true,
                    next_keyless: 0,
                }),
                appended: Notify::new(),
            }),
        }
    }

    /// Partition count used for topics created on first produce.
    pub fn with_partitions(self, partitions: usize) -> Self {
        self.lock().default_partitions = partitions.max(1);
        self
    }

    /// Reject messages whose value is larger than `bytes`, like a broker's
    /// `message.max.bytes`.
    pub fn with_max_message_bytes(self, bytes: usize) -> Self {
        self.lock().max_message_bytes = Some(bytes);
        self
    }

    /// Create `topic` with `partitions` partitions unless it already exists.
    pub fn create_topic(&self, topic: &str, partitions: usize) {
        self.lock()
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| vec![Vec::new(); partitions.max(1)]);
    }

    /// Every message stored for `topic`, partition by partition.
    pub fn messages(&self, topic: &str) -> Vec<Message> {
        self.lock()
            .topics
            .get(topic)
            .map(|partitions| partitions.iter().flatten().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop all connections: producers fail with
    /// [`Error::Connection`], consumers with [`Error::Subscription`].
    pub fn disconnect(&self) {
        self.lock().connected = false;
        self.inner.appended.notify_waiters();
        debug!("Memory broker disconnected");
    }

    pub fn consumer(&self) -> MemoryConsumer {
        MemoryConsumer {
            broker: self.clone(),
            topic: OnceLock::new(),
            cursor: Mutex::new(Cursor::default()),
        }
    }

    pub fn producer(&self) -> MemoryProducer {
        MemoryProducer {
            broker: self.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn append(&self, message: &Message) -> Result<()> {
        let mut guard = self.lock();
        let state = &mut *guard;

        if !state.connected {
            return Err(Error::Connection("Memory broker is disconnected".to_string()));
        }
        if let Some(max) = state.max_message_bytes {
            if message.value.len() > max {
                return Err(Error::Delivery(format!(
                    "Message of {} bytes to '{}' exceeds the limit of {max} bytes",
                    message.value.len(),
                    message.topic
                )));
            }
        }

        let default_partitions = state.default_partitions;
        let partitions = state
            .topics
            .entry(message.topic.clone())
            .or_insert_with(|| vec![Vec::new(); default_partitions]);

        let partition = match &message.key {
            Some(key) => {
                let mut hasher = DefaultHasher::new();
                key.hash(&mut hasher);
                (hasher.finish() % partitions.len() as u64) as usize
            }
            None => {
                let partition = state.next_keyless % partitions.len();
                state.next_keyless = state.next_keyless.wrapping_add(1);
                partition
            }
        };

        let log = &mut partitions[partition];
        let offset = log.len() as i64;
        log.push(Message {
            partition: Some(partition as i32),
            offset: Some(offset),
            timestamp: Some(now_millis()),
            ..message.clone()
        });
        drop(guard);

        self.inner.appended.notify_waiters();
        Ok(())
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

#[derive(Default)]
struct Cursor {
    positions: Vec<usize>,
    next_partition: usize,
}

pub struct MemoryConsumer {
    broker: MemoryBroker,
    topic: OnceLock<String>,
    cursor: Mutex<Cursor>,
}

impl MemoryConsumer {
    fn topic(&self) -> &str {
        self.topic.get().map(String::as_str).unwrap_or_default()
    }

    /// Next unread message, visiting partitions round-robin.
    fn poll(&self) -> Result<Option<Message>> {
        let topic = self.topic();
        let state = self.broker.lock();
        if !state.connected {
            return Err(Error::subscription(topic, "Broker connection lost"));
        }
        let Some(partitions) = state.topics.get(topic) else {
            return Err(Error::subscription(topic, "Topic no longer exists"));
        };

        let mut cursor = self
            .cursor
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if cursor.positions.len() < partitions.len() {
            cursor.positions.resize(partitions.len(), 0);
        }

        let count = partitions.len();
        for step in 0..count {
            let partition = (cursor.next_partition + step) % count;
            let position = cursor.positions[partition];
            if let Some(message) = partitions[partition].get(position) {
                cursor.positions[partition] += 1;
                cursor.next_partition = (partition + 1) % count;
                return Ok(Some(message.clone()));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl ConsumerBackend for MemoryConsumer {
    async fn subscribe(&self, topic: &str) -> Result<()> {
        let state = self.broker.lock();
        if !state.connected {
            return Err(Error::subscription(topic, "Broker connection lost"));
        }
        if !state.topics.contains_key(topic) {
            return Err(Error::subscription(topic, "Unknown topic"));
        }
        let _ = self.topic.set(topic.to_string());
        Ok(())
    }

    async fn recv(&self) -> Result<Message> {
        loop {
            // Registered before polling so an append in between is not missed
            let appended = self.broker.inner.appended.notified();
            if let Some(message) = self.poll()? {
                return Ok(message);
            }
            appended.await;
        }
    }

    fn shutdown(&self) {
        debug!("Memory consumer for '{}' shut down", self.topic());
    }
}

pub struct MemoryProducer {
    broker: MemoryBroker,
}

#[async_trait]
impl ProducerBackend for MemoryProducer {
    async fn send_batch(&self, batch: &[Message]) -> Result<()> {
        for message in batch {
            self.broker.append(message)?;
        }
        Ok(())
    }

    fn flush(&self, _timeout: Duration) -> Result<()> {
        // Appends are synchronous, nothing is ever buffered
        Ok(())
    }
}
