//! # Long-running device tasks.
//!
//! - [`Task`] trait for async, cancelable units supervised by the [`Device`](crate::Device)
//! - [`TaskRef`] shared handle (`Arc<dyn Task>`)
//!
//! Implemented by `ConnectivityLoop`, `OutboundWorker`, `TicketFlow` and
//! `DeadlockMonitor`.

mod task;

pub use task::{Task, TaskRef};
