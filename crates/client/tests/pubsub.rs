//! Producer to consumer behaviour over the in-process broker.

use async_trait::async_trait;
use kfktools_client::memory::{MemoryBroker, MemoryConsumer, MemoryProducer};
use kfktools_client::{
    ConsumerBackend, ConsumerClient, Error, ErrorKind, Message, ProducerBackend, ProducerClient,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("kfktools_client=debug")
        .try_init()
        .ok();
}

#[tokio::test]
async fn test_first_message_round_trip() {
    init_tracing();
    let broker = MemoryBroker::new();

    let producer = ProducerClient::with_backend(broker.producer());
    producer
        .send(&[Message::keyed("t", "k1", vec![1u8, 2, 3])])
        .await
        .unwrap();

    let consumer = ConsumerClient::with_backend(broker.consumer());
    let mut subscription = consumer.listen_to("t").await.unwrap();
    let message = subscription.next_message().await.unwrap();

    assert_eq!(message.value, vec![1, 2, 3]);
    assert_eq!(message.key(), Some(b"k1".as_slice()));
    assert_eq!(message.topic, "t");
    assert_eq!(message.offset, Some(0));

    producer.close().unwrap();
    consumer.close();
}

#[tokio::test]
async fn test_per_key_order_is_preserved() {
    init_tracing();
    let broker = MemoryBroker::new();
    broker.create_topic("orders", 3);

    let producer = ProducerClient::with_backend(broker.producer());
    let keys = ["alice", "bob", "carol", "dave"];
    for round in 0..5u8 {
        let batch: Vec<Message> = keys
            .iter()
            .map(|key| Message::keyed("orders", *key, vec![round]))
            .collect();
        producer.send(&batch).await.unwrap();
    }

    let consumer = ConsumerClient::with_backend(broker.consumer());
    let mut subscription = consumer.listen_to("orders").await.unwrap();

    let mut seen: HashMap<Vec<u8>, Vec<u8>> = HashMap::new();
    for _ in 0..keys.len() * 5 {
        let message = subscription.next_message().await.unwrap();
        seen.entry(message.key.clone().unwrap())
            .or_default()
            .push(message.value[0]);
    }

    for key in keys {
        assert_eq!(seen[key.as_bytes()], vec![0, 1, 2, 3, 4], "key {key}");
    }
}

#[tokio::test]
async fn test_consumer_sees_messages_sent_while_waiting() {
    let broker = MemoryBroker::new();
    broker.create_topic("live", 2);

    let consumer = ConsumerClient::with_backend(broker.consumer());
    let mut subscription = consumer.listen_to("live").await.unwrap();

    let producer = ProducerClient::with_backend(broker.producer());
    let sender = tokio::spawn(async move {
        for i in 0..3u8 {
            tokio::task::yield_now().await;
            producer
                .send(&[Message::keyed("live", "same-key", vec![i])])
                .await?;
        }
        producer.close()
    });

    let mut values = Vec::new();
    for _ in 0..3 {
        let message = tokio::time::timeout(Duration::from_secs(5), subscription.next_message())
            .await
            .expect("message should arrive")
            .unwrap();
        values.push(message.value[0]);
    }
    assert_eq!(values, vec![0, 1, 2]);
    sender.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_double_close_and_closed_errors() {
    let broker = MemoryBroker::new();
    broker.create_topic("t", 1);

    let consumer = ConsumerClient::with_backend(broker.consumer());
    let mut subscription = consumer.listen_to("t").await.unwrap();
    let producer = ProducerClient::with_backend(broker.producer());

    consumer.close();
    consumer.close();
    producer.close().unwrap();
    producer.close().unwrap();

    assert!(matches!(subscription.next_message().await, Err(Error::Closed)));
    assert!(matches!(
        producer.send(&[Message::new("t", vec![1u8])]).await,
        Err(Error::Closed)
    ));
}

/// Counts how often a backend was released (shutdown or flush) and dropped.
#[derive(Clone, Default)]
struct Counters {
    released: Arc<AtomicUsize>,
    dropped: Arc<AtomicUsize>,
}

impl Counters {
    fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    fn dropped(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }
}

struct Tracked<B> {
    inner: B,
    counters: Counters,
}

impl<B> Drop for Tracked<B> {
    fn drop(&mut self) {
        self.counters.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConsumerBackend for Tracked<MemoryConsumer> {
    async fn subscribe(&self, topic: &str) -> kfktools_client::Result<()> {
        self.inner.subscribe(topic).await
    }

    async fn recv(&self) -> kfktools_client::Result<Message> {
        self.inner.recv().await
    }

    fn shutdown(&self) {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
        self.inner.shutdown();
    }
}

#[async_trait]
impl ProducerBackend for Tracked<MemoryProducer> {
    async fn send_batch(&self, batch: &[Message]) -> kfktools_client::Result<()> {
        self.inner.send_batch(batch).await
    }

    fn flush(&self, timeout: Duration) -> kfktools_client::Result<()> {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
        self.inner.flush(timeout)
    }
}

#[tokio::test]
async fn test_consumer_released_on_error_path() {
    async fn session(broker: &MemoryBroker, counters: &Counters) -> kfktools_client::Result<()> {
        let consumer = ConsumerClient::with_backend(Tracked {
            inner: broker.consumer(),
            counters: counters.clone(),
        });
        let _subscription = consumer.listen_to("t").await?;
        // Never reached: the topic does not exist
        Ok(())
    }

    let broker = MemoryBroker::new();
    let counters = Counters::default();
    let err = session(&broker, &counters).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Subscription);
    assert_eq!(counters.released(), 1);
    assert_eq!(counters.dropped(), 1);
}

#[tokio::test]
async fn test_producer_flushed_and_released_on_error_path() {
    async fn session(broker: &MemoryBroker, counters: &Counters) -> kfktools_client::Result<()> {
        let producer = ProducerClient::with_backend(Tracked {
            inner: broker.producer(),
            counters: counters.clone(),
        });
        producer.send(&[Message::new("t", b"ok".to_vec())]).await?;
        broker.disconnect();
        producer.send(&[Message::new("t", b"lost".to_vec())]).await?;
        Ok(())
    }

    let broker = MemoryBroker::new();
    let counters = Counters::default();
    let err = session(&broker, &counters).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Connection);
    assert_eq!(counters.released(), 1);
    assert_eq!(counters.dropped(), 1);
    assert_eq!(broker.messages("t").len(), 1);
}
