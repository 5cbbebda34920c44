//! Seams between the clients and the broker library underneath.
//!
//! [`ConsumerClient`](crate::ConsumerClient) and
//! [`ProducerClient`](crate::ProducerClient) own the lifecycle (closed
//! flag, cancellation, fatal-error latch). Backends only talk to the
//! broker. The Kafka backends live in [`crate::kafka`], an in-process
//! broker for tests and local runs in [`crate::memory`].

use crate::error::Result;
use crate::message::Message;
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait ConsumerBackend: Send + Sync {
    /// Register interest in `topic`.
    ///
    /// Fails with [`Error::Subscription`](crate::Error::Subscription) when
    /// the topic cannot be resolved. Lookups that block must run off the
    /// async runtime. Called again only after a failed attempt.
    async fn subscribe(&self, topic: &str) -> Result<()>;

    /// Wait for the next message of the subscribed topic.
    ///
    /// Must be cancel safe: the client drops this future when it is closed.
    async fn recv(&self) -> Result<Message>;

    /// Leave the subscription. Called once, when the client closes; the
    /// backend is dropped right after.
    fn shutdown(&self);
}

#[async_trait]
pub trait ProducerBackend: Send + Sync {
    /// Hand every message of `batch` to the broker and wait until each one
    /// is resolved.
    ///
    /// Returns [`Error::Connection`](crate::Error::Connection) only for
    /// failures that make the connection unusable, and
    /// [`Error::Delivery`](crate::Error::Delivery) otherwise.
    async fn send_batch(&self, batch: &[Message]) -> Result<()>;

    /// Wait up to `timeout` for buffered messages to be delivered.
    fn flush(&self, timeout: Duration) -> Result<()>;
}
