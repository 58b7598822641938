//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted by the device components.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Device`, `Connectivity`, `OutboundWorker`, `TicketFlow`,
//!   `Handlers`, `DeadlockMonitor`.
//! - **Consumers**: `Device::subscriber_listener()` which fans out to the
//!   [`SubscriberSet`](crate::SubscriberSet) (the built-in `LogWriter` among them).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
