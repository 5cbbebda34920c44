use crate::backend::ConsumerBackend;
use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::kafka::KafkaConsumer;
use crate::message::Message;
use futures::Stream;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Consumer owning one broker connection and at most one subscription.
///
/// Dropping the client closes it, so a `?` or a panic between
/// construction and [`close`](Self::close) still releases the connection.
pub struct ConsumerClient {
    shared: Arc<Shared>,
}

struct Shared {
    /// Taken on close; outstanding cursors keep only the lifecycle state.
    backend: Mutex<Option<Arc<dyn ConsumerBackend>>>,
    topic: Mutex<Option<String>>,
    closed: AtomicBool,
    shutdown: CancellationToken,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn backend(&self) -> Result<Arc<dyn ConsumerBackend>> {
        lock(&self.backend).clone().ok_or(Error::Closed)
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shutdown.cancel();
        let backend = lock(&self.backend).take();
        if let Some(backend) = backend {
            backend.shutdown();
        }
        info!(
            "Consumer closed (topic: {})",
            lock(&self.topic).as_deref().unwrap_or("<none>")
        );
    }
}

impl ConsumerClient {
    /// Create a Kafka consumer from `config`.
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        Ok(Self::with_backend(KafkaConsumer::new(config)?))
    }

    /// Wrap an already constructed backend.
    pub fn with_backend(backend: impl ConsumerBackend + 'static) -> Self {
        let backend: Arc<dyn ConsumerBackend> = Arc::new(backend);
        Self {
            shared: Arc::new(Shared {
                backend: Mutex::new(Some(backend)),
                topic: Mutex::new(None),
                closed: AtomicBool::new(false),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Subscribe to `topic` and return a cursor over its messages.
    ///
    /// Resolves once the broker has accepted the subscription, before any
    /// message is read. A client supports a single subscription; a second
    /// call fails with [`Error::Subscription`] and leaves the first one
    /// untouched. Closing the client while this waits returns
    /// [`Error::Closed`].
    pub async fn listen_to(&self, topic: &str) -> Result<Subscription> {
        if self.shared.is_closed() {
            return Err(Error::Closed);
        }
        if topic.is_empty() {
            return Err(Error::subscription(topic, "Topic name must not be empty"));
        }
        let backend = self.shared.backend()?;

        {
            let mut current = lock(&self.shared.topic);
            if let Some(current) = current.as_deref() {
                return Err(Error::subscription(
                    topic,
                    format!("Client is already subscribed to '{current}'"),
                ));
            }
            *current = Some(topic.to_string());
        }

        let subscribed = tokio::select! {
            biased;
            _ = self.shared.shutdown.cancelled() => Err(Error::Closed),
            subscribed = backend.subscribe(topic) => subscribed,
        };
        if let Err(err) = subscribed {
            // A failed attempt does not count as the subscription
            *lock(&self.shared.topic) = None;
            return Err(err);
        }

        Ok(Subscription {
            shared: Arc::clone(&self.shared),
            topic: topic.to_string(),
            terminated: None,
        })
    }

    /// Release the connection. Calling it again does nothing.
    ///
    /// The backend is dropped here even if cursors are still around; a
    /// [`Subscription::next_message`] waiting at this point returns
    /// [`Error::Closed`].
    pub fn close(&self) {
        self.shared.close();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Handle that closes this client from elsewhere, e.g. a signal handler
    /// running while the owner waits on the subscription.
    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Drop for ConsumerClient {
    fn drop(&mut self) {
        self.shared.close();
    }
}

#[derive(Clone)]
pub struct CloseHandle {
    shared: Arc<Shared>,
}

impl CloseHandle {
    pub fn close(&self) {
        self.shared.close();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }
}

/// Cursor over the messages of one topic.
///
/// The sequence never ends on its own. It stops yielding messages when the
/// client is closed ([`Error::Closed`]) or the broker reports an error
/// ([`Error::Subscription`]); after such an error every further call fails
/// the same way.
pub struct Subscription {
    shared: Arc<Shared>,
    topic: String,
    terminated: Option<String>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("closed", &self.shared.is_closed())
            .field("terminated", &self.terminated)
            .finish()
    }
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Wait for the next message.
    pub async fn next_message(&mut self) -> Result<Message> {
        if self.shared.is_closed() {
            return Err(Error::Closed);
        }
        if let Some(reason) = &self.terminated {
            return Err(Error::subscription(&self.topic, reason));
        }
        let backend = self.shared.backend()?;

        let received = tokio::select! {
            biased;
            _ = self.shared.shutdown.cancelled() => return Err(Error::Closed),
            received = backend.recv() => received,
        };

        match received {
            Ok(message) => {
                debug!(
                    "Received message from '{}' (partition: {:?}, offset: {:?})",
                    message.topic, message.partition, message.offset
                );
                Ok(message)
            }
            Err(err) => {
                self.terminated = Some(match &err {
                    Error::Subscription { reason, .. } => reason.clone(),
                    other => other.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Turn the cursor into a [`Stream`] that ends after its first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Message>> {
        futures::stream::unfold(Some(self), |state| async move {
            let mut subscription = state?;
            match subscription.next_message().await {
                Ok(message) => Some((Ok(message), Some(subscription))),
                Err(err) => Some((Err(err), None)),
            }
        })
    }
}
