//! # OutboundQueue: bounded FIFO of outbound messages.
//!
//! ## Rules
//! - `len() <= capacity` whenever no enqueue/dequeue is in progress.
//! - FIFO, except [`OutboundQueue::evict_oldest`] which drops from the front
//!   and leaves the relative order of the remaining messages untouched.
//! - Every operation enters the critical section with a bounded wait
//!   (`lock_timeout`); failing to enter is reported, never waited out.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;

use super::OutboundMessage;
use crate::error::QueueError;

/// Bounded outbound queue shared by all producers and the single worker.
#[derive(Debug)]
pub struct OutboundQueue {
    items: Mutex<VecDeque<OutboundMessage>>,
    capacity: usize,
    lock_timeout: Duration,
}

impl OutboundQueue {
    /// Creates an empty queue holding at most `capacity` messages (minimum 1).
    pub fn new(capacity: usize, lock_timeout: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            lock_timeout,
        }
    }

    /// Appends a message; a full queue rejects it.
    pub fn enqueue(&self, message: OutboundMessage) -> Result<(), QueueError> {
        let mut items = self
            .items
            .try_lock_for(self.lock_timeout)
            .ok_or(QueueError::Contended)?;
        if items.len() >= self.capacity {
            return Err(QueueError::Full {
                capacity: self.capacity,
            });
        }
        items.push_back(message);
        Ok(())
    }

    /// Pops the oldest message. `None` when empty or contended.
    pub fn dequeue(&self) -> Option<OutboundMessage> {
        self.items.try_lock_for(self.lock_timeout)?.pop_front()
    }

    /// Drops the `n` oldest messages and returns how many were dropped.
    pub fn evict_oldest(&self, n: usize) -> usize {
        let Some(mut items) = self.items.try_lock_for(self.lock_timeout) else {
            return 0;
        };
        let n = n.min(items.len());
        items.drain(..n);
        n
    }

    /// Current depth.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
