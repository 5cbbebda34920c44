use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The broker connection could not be established or was lost.
    ///
    /// Fatal to the client instance; build a new one to continue.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Subscribing to a topic failed, or an established subscription broke.
    #[error("Subscription to topic '{topic}' failed: {reason}")]
    Subscription { topic: String, reason: String },

    /// A batch was rejected. The client stays usable.
    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Client is closed")]
    Closed,
}

impl Error {
    pub(crate) fn subscription(topic: &str, reason: impl fmt::Display) -> Self {
        Error::Subscription {
            topic: topic.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Connection(_) => ErrorKind::Connection,
            Error::Subscription { .. } => ErrorKind::Subscription,
            Error::Delivery(_) => ErrorKind::Delivery,
            Error::Closed => ErrorKind::Closed,
        }
    }
}

/// Coarse classification of [`Error`], for logging and retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Connection,
    Subscription,
    Delivery,
    Closed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Connection => "connection",
            ErrorKind::Subscription => "subscription",
            ErrorKind::Delivery => "delivery",
            ErrorKind::Closed => "closed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
