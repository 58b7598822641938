use std::sync::Arc;

/// One notification waiting for delivery. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    topic: Arc<str>,
    payload: Arc<str>,
    retain: bool,
}

impl OutboundMessage {
    pub fn new(topic: impl Into<Arc<str>>, payload: impl Into<Arc<str>>, retain: bool) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            retain,
        }
    }

    /// Destination topic.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Whether the broker should keep the message as the topic's last value.
    pub fn retain(&self) -> bool {
        self.retain
    }
}
