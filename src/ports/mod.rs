//! # Device collaborators.
//!
//! The core talks to hardware and transports only through these traits:
//!
//! - [`Link`] network link (establish / observe);
//! - [`MessageBus`] message-bus session (connect / subscribe / service / publish);
//! - [`Display`] 3-digit numeric or single status character renderer;
//! - [`KeyValueStore`] durable integer store, implemented in memory by [`MemoryStore`];
//! - [`Restart`] full device restart.
//!
//! The remote bakery service contract lives in [`crate::remote`].

mod bus;
mod display;
mod link;
mod restart;
mod store;

use thiserror::Error;

pub use bus::{InboundMessage, MessageBus};
pub use display::{Display, NullDisplay};
pub use link::Link;
pub use restart::Restart;
pub use store::{KeyValueStore, MemoryStore};

/// Failure reported by a collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct PortError(pub String);

impl PortError {
    /// Creates an error from any displayable reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}
