//! Link and broker supervision.
//!
//! - [`Connectivity`] the state machine and request admission gate;
//! - [`ConnectivityLoop`] the task ticking it and dispatching inbound messages.

mod driver;
mod state;

pub use driver::ConnectivityLoop;
pub use state::{Connectivity, ConnectivityState};
