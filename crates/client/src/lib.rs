//! Kafka consumer and producer clients with a scoped lifecycle.
//!
//! - [`ConsumerClient`]: subscribes to one topic and hands out a
//!   [`Subscription`] cursor whose `next_message` waits for the next message
//! - [`ProducerClient`]: sends batches of keyed messages to any topics
//!
//! Both own exactly one broker connection. `close()` is idempotent, every
//! operation after it fails with [`Error::Closed`], and dropping a client
//! closes it. Callers never see `rdkafka` types; the broker library sits
//! behind the [`backend`] traits, with [`memory`] as an in-process stand-in.

pub mod backend;
pub mod config;

/// Consumer client and its subscription cursor
pub mod consumer;
pub mod error;

/// `rdkafka` implementations of the backend traits
pub mod kafka;
pub mod memory;
pub mod message;

/// Producer client
pub mod producer;

// Re-export main types for easy access
pub use backend::{ConsumerBackend, ProducerBackend};
pub use config::ConnectionConfig;
pub use consumer::{CloseHandle, ConsumerClient, Subscription};
pub use error::{Error, ErrorKind, Result};
pub use message::Message;
pub use producer::ProducerClient;
