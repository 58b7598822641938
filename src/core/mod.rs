//! Device runtime: wiring, supervision and shutdown.
//!
//! The only public API from this module is [`Device`] (with [`DeviceBuilder`])
//! and [`RestartSignal`], the [`Restart`](crate::ports::Restart) used by the
//! deadlock monitor.
//!
//! Internal modules:
//! - [`runtime`]: builds the components and runs the long-running tasks;
//! - [`alive`]: tracks which tasks are still running for grace reporting;
//! - [`shutdown`]: OS signal handling.

mod alive;
mod runtime;
mod shutdown;

pub use runtime::{Device, DeviceBuilder, RestartSignal};
