use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Well-known librdkafka keys. Any other key is passed through as well.
pub const BOOTSTRAP_SERVERS: &str = "bootstrap.servers";
pub const GROUP_ID: &str = "group.id";
pub const AUTO_OFFSET_RESET: &str = "auto.offset.reset";

/// Connection settings handed to the broker client without validation.
///
/// The recognized keys are whatever the broker client understands
/// (`bootstrap.servers`, `group.id`, `session.timeout.ms`, ...). Clients
/// copy the entries at construction, so one config can be shared by any
/// number of clients.
///
/// Serializes as a flat string map:
///
/// ```
/// use kfktools_client::ConnectionConfig;
///
/// let config = ConnectionConfig::new()
///     .with("bootstrap.servers", "localhost:9092")
///     .with("group.id", "audit");
/// assert_eq!(config.get("group.id"), Some("audit"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionConfig {
    entries: BTreeMap<String, String>,
}

impl ConnectionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Set `key`, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// Set `key` only if it has no value yet.
    pub fn set_default(&mut self, key: &str, value: &str) -> &mut Self {
        self.entries
            .entry(key.to_string())
            .or_insert_with(|| value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ConnectionConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut config = Self::new();
        config.extend(iter);
        config
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for ConnectionConfig {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.set(key, value);
        }
    }
}
