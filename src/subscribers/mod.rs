//! # Event subscribers.
//!
//! [`Subscribe`] is the extension point for reacting to device [`Event`](crate::Event)s;
//! [`SubscriberSet`] fans events out to subscribers through per-subscriber
//! bounded queues; [`LogWriter`] renders events through `tracing`.
//!
//! ```text
//!   Bus ──► Device::subscriber_listener ──► SubscriberSet::emit(&Event)
//!                                             ├──► [queue] ─► LogWriter
//!                                             └──► [queue] ─► custom ...
//! ```

mod log;
mod set;
mod subscribe;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
