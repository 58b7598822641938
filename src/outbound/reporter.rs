use std::sync::Arc;

use super::{OutboundMessage, OutboundQueue};
use crate::events::{Bus, Event, EventKind};

/// Producer handle over the [`OutboundQueue`]. Cheap to clone.
///
/// Diagnostics go to the device's errors topic with `retain = true`. A message
/// that cannot be enqueued is logged as [`EventKind::OutboundDropped`] and
/// otherwise ignored.
#[derive(Debug, Clone)]
pub struct Reporter {
    queue: Arc<OutboundQueue>,
    errors_topic: Arc<str>,
    bus: Bus,
}

impl Reporter {
    pub fn new(queue: Arc<OutboundQueue>, errors_topic: impl Into<Arc<str>>, bus: Bus) -> Self {
        Self {
            queue,
            errors_topic: errors_topic.into(),
            bus,
        }
    }

    /// Queues a diagnostic message. Returns whether it was accepted.
    pub fn error(&self, payload: impl Into<Arc<str>>) -> bool {
        let msg = OutboundMessage::new(Arc::clone(&self.errors_topic), payload, true);
        self.push(msg)
    }

    /// Queues an arbitrary message. Returns whether it was accepted.
    pub fn publish(&self, topic: impl Into<Arc<str>>, payload: impl Into<Arc<str>>, retain: bool) -> bool {
        self.push(OutboundMessage::new(topic, payload, retain))
    }

    fn push(&self, msg: OutboundMessage) -> bool {
        let topic = msg.topic().to_string();
        match self.queue.enqueue(msg) {
            Ok(()) => true,
            Err(e) => {
                self.bus.publish(
                    Event::new(EventKind::OutboundDropped).with_reason(format!("{topic}: {e}")),
                );
                false
            }
        }
    }

    /// The queue this reporter feeds.
    pub fn queue(&self) -> &Arc<OutboundQueue> {
        &self.queue
    }
}
