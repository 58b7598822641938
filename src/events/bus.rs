//! # Event bus for device events.
//!
//! [`Bus`] wraps [`tokio::sync::broadcast`]. Every component holds a clone and
//! publishes without blocking; the device runtime owns the only long-lived
//! receiver and forwards to the [`SubscriberSet`](crate::SubscriberSet).
//!
//! ```text
//!   Connectivity ──┐
//!   OutboundWorker ┤
//!   TicketFlow ────┼──► Bus ──► subscriber_listener ──► SubscriberSet ──► LogWriter, ...
//!   Handlers ──────┤  (broadcast)   (in Device)
//!   DeadlockMonitor┘
//! ```
//!
//! ## Rules
//! - `publish()` never blocks and never fails; with no receiver the event is dropped.
//! - One ring buffer of `capacity` events is shared by all receivers; a receiver
//!   that falls behind observes `RecvError::Lagged(n)` and skips `n` events.
//! - Events are diagnostics, not state: nothing in the core reads them back.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for device events. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus holding at most `capacity` undelivered events (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all current receivers.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver observing events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn test_receiver_sees_events_after_subscribe() {
        let bus = Bus::new(8);
        bus.publish(Event::new(EventKind::QueueEmpty)); // no receiver yet: dropped

        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::TicketSkipped).with_ticket(7));

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::TicketSkipped);
        assert_eq!(ev.ticket, Some(7));
    }
}
