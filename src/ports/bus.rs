use async_trait::async_trait;

use super::PortError;
use crate::outbound::OutboundMessage;

/// A message received on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: String,
}

/// Message-bus session (e.g. an MQTT client).
///
/// `is_connected` must be cheap; it is sampled by the outbound worker on every
/// tick and by the connectivity state machine.
#[async_trait]
pub trait MessageBus: Send + Sync + 'static {
    /// Whether the broker session is currently established.
    fn is_connected(&self) -> bool;

    /// Establishes a session identified by `client_id`.
    async fn connect(&self, client_id: &str) -> Result<(), PortError>;

    /// Subscribes the current session to `topic`.
    async fn subscribe(&self, topic: &str) -> Result<(), PortError>;

    /// Services the session and returns the messages received since the last call.
    async fn poll(&self) -> Vec<InboundMessage>;

    /// Publishes one message.
    async fn publish(&self, message: &OutboundMessage) -> Result<(), PortError>;
}
