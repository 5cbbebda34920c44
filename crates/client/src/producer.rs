use crate::backend::ProducerBackend;
use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::kafka::KafkaProducer;
use crate::message::Message;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Upper bound for the flush done on close.
pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// Producer owning one broker connection.
///
/// Buffering and retries belong to the backend; this type adds the
/// closed flag and remembers connection-fatal failures. Dropping the
/// client closes (and flushes) it.
pub struct ProducerClient {
    /// Taken on close, which drops the connection.
    backend: Mutex<Option<Arc<dyn ProducerBackend>>>,
    closed: AtomicBool,
    fatal: OnceLock<String>,
    flush_timeout: Duration,
}

impl ProducerClient {
    /// Create a Kafka producer from `config`.
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        Ok(Self::with_backend(KafkaProducer::new(config)?))
    }

    pub fn with_backend(backend: impl ProducerBackend + 'static) -> Self {
        let backend: Arc<dyn ProducerBackend> = Arc::new(backend);
        Self {
            backend: Mutex::new(Some(backend)),
            closed: AtomicBool::new(false),
            fatal: OnceLock::new(),
            flush_timeout: DEFAULT_FLUSH_TIMEOUT,
        }
    }

    pub fn with_flush_timeout(mut self, timeout: Duration) -> Self {
        self.flush_timeout = timeout;
        self
    }

    /// Send `batch`, which may span several topics.
    ///
    /// Returns once the backend has resolved every message according to
    /// its durability settings. Messages are not sent all-or-nothing: on
    /// error some of them may already have been delivered.
    pub async fn send(&self, batch: &[Message]) -> Result<()> {
        self.ensure_usable()?;
        if batch.is_empty() {
            return Ok(());
        }
        if let Some(position) = batch.iter().position(|m| m.topic.is_empty()) {
            return Err(Error::Delivery(format!(
                "Message {position} of the batch has an empty topic name"
            )));
        }

        let backend = self.backend()?;
        match backend.send_batch(batch).await {
            Ok(()) => {
                debug!("Sent batch of {} messages", batch.len());
                Ok(())
            }
            Err(Error::Connection(reason)) => {
                warn!("Producer connection failed: {}", reason);
                let _ = self.fatal.set(reason.clone());
                Err(Error::Connection(reason))
            }
            Err(err) => Err(err),
        }
    }

    /// Flush buffered messages and release the connection.
    ///
    /// Only the first call does anything; later calls return `Ok(())`.
    /// The connection is released even when the flush fails.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let Some(backend) = self.lock_backend().take() else {
            return Ok(());
        };
        let flushed = backend.flush(self.flush_timeout);
        drop(backend);
        info!("Producer closed");
        flushed
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn lock_backend(&self) -> MutexGuard<'_, Option<Arc<dyn ProducerBackend>>> {
        self.backend.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn backend(&self) -> Result<Arc<dyn ProducerBackend>> {
        self.lock_backend().clone().ok_or(Error::Closed)
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        if let Some(reason) = self.fatal.get() {
            return Err(Error::Connection(reason.clone()));
        }
        Ok(())
    }
}

impl Drop for ProducerClient {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to flush producer on drop: {}", e);
        }
    }
}
