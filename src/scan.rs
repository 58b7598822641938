//! # Pending scan slot.
//!
//! Holds at most one scanned ticket id. The scanner side (out of core scope)
//! calls [`ScanSlot::record`]; a newer scan overwrites an unconsumed one.
//! The ticket flow consumes with [`ScanSlot::take_if`], which only removes a
//! scan matching the displayed ticket. A non-matching scan stays in the slot
//! until it is overwritten.

use parking_lot::Mutex;

use crate::remote::TicketId;

/// Single last-write-wins scan slot.
#[derive(Debug, Default)]
pub struct ScanSlot {
    pending: Mutex<Option<TicketId>>,
}

impl ScanSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a scan; returns the unconsumed scan it replaced, if any.
    pub fn record(&self, ticket: TicketId) -> Option<TicketId> {
        self.pending.lock().replace(ticket)
    }

    /// Consumes the pending scan if it is for `ticket`.
    pub fn take_if(&self, ticket: TicketId) -> bool {
        let mut pending = self.pending.lock();
        if *pending == Some(ticket) {
            *pending = None;
            true
        } else {
            false
        }
    }

    /// Puts a consumed scan back unless a newer one arrived meanwhile.
    pub fn restore(&self, ticket: TicketId) {
        self.pending.lock().get_or_insert(ticket);
    }

    /// Pending scan, without consuming it.
    pub fn peek(&self) -> Option<TicketId> {
        *self.pending.lock()
    }
}
