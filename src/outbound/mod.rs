//! # Outbound notifications.
//!
//! Producers (any component reporting status or errors) enqueue
//! [`OutboundMessage`]s through a [`Reporter`]; a single [`OutboundWorker`]
//! drains the [`OutboundQueue`] to the [`MessageBus`](crate::ports::MessageBus).
//!
//! ```text
//!   Reporter ──enqueue──► OutboundQueue (bounded, FIFO) ──dequeue──► OutboundWorker ──► MessageBus
//!   Reporter ──┘                ▲                                        │
//!                               └──────── evict oldest half ◄── OverflowGuard (sampled)
//! ```
//!
//! Delivery is best effort: a full queue rejects, a failed publish is logged
//! and discarded, and sustained overload sacrifices the oldest messages.

mod message;
mod queue;
mod reporter;
mod worker;

pub use message::OutboundMessage;
pub use queue::OutboundQueue;
pub use reporter::Reporter;
pub use worker::{OutboundWorker, OverflowGuard};
