//! Ticket sequencing.
//!
//! - [`TicketFlow`] the single poll → announce → scan-or-timeout → advance loop;
//! - [`QueueHint`] the eventually-consistent "customer queued" flag it shares
//!   with the new-customer handler.

mod hint;
mod ticket_flow;

pub use hint::QueueHint;
pub use ticket_flow::{CycleOutcome, FlowState, TicketFlow};
