/// A raw broker message.
///
/// Outgoing messages only need `topic`, `key` and `value`. Messages handed
/// out by a consumer also carry where they were read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Topic the message is sent to or was read from
    pub topic: String,
    /// Message key (if any); messages with equal keys land in the same partition
    pub key: Option<Vec<u8>>,
    /// Message payload; empty for tombstones
    pub value: Vec<u8>,
    /// Partition the message was read from
    pub partition: Option<i32>,
    /// Offset within the partition
    pub offset: Option<i64>,
    /// Message timestamp (milliseconds since epoch)
    pub timestamp: Option<i64>,
}

impl Message {
    pub fn new(topic: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            key: None,
            value: value.into(),
            partition: None,
            offset: None,
            timestamp: None,
        }
    }

    pub fn keyed(
        topic: impl Into<String>,
        key: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        Self::new(topic, value).with_key(key)
    }

    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn key(&self) -> Option<&[u8]> {
        self.key.as_deref()
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }
}
