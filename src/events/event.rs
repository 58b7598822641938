//! # Events emitted by the device components.
//!
//! [`EventKind`] classifies events in groups:
//! - **Runtime**: task lifecycle and shutdown
//! - **Busy lock**: contention and deadlock
//! - **Connectivity**: phase transitions
//! - **Outbound**: drops, failed publishes, eviction
//! - **Catalog**: loads and fetch failures
//! - **Ticket flow**: announce, advance, skip, empty queue
//!
//! [`Event`] carries the optional metadata (task, ticket, count, reason).
//!
//! ## Ordering guarantees
//! Every event gets a process-wide monotonic `seq`.
//!
//! ## Example
//! ```rust
//! use ticketvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::TicketAnnounced)
//!     .with_ticket(7)
//!     .with_count(170);
//!
//! assert_eq!(ev.kind, EventKind::TicketAnnounced);
//! assert_eq!(ev.ticket, Some(7));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::remote::TicketId;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of device events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Runtime ===
    /// Long-running task started. Sets `task`.
    TaskStarting,
    /// Long-running task exited cleanly. Sets `task`.
    TaskStopped,
    /// Long-running task exited with an error. Sets `task`, `reason`.
    TaskFailed,
    /// OS termination signal observed.
    ShutdownRequested,
    /// All tasks stopped within the grace period.
    AllStoppedWithin,
    /// Grace period exceeded.
    GraceExceeded,

    // === Busy lock ===
    /// A caller gave up waiting for the busy lock. Sets `task` (operation).
    LockContended,
    /// Busy lock held past the ceiling; restart requested. Sets `delay_ms` (held for).
    DeadlockDetected,

    // === Connectivity ===
    /// Link is down. Admission blocked.
    LinkDown,
    /// Link up, broker session down or failed to connect. Sets `reason` on failure.
    BrokerDown,
    /// Link and broker session established; admission open.
    ConnectivityReady,

    // === Outbound ===
    /// A message could not be enqueued. Sets `reason`.
    OutboundDropped,
    /// The bus rejected a message; it was discarded. Sets `reason` (topic).
    PublishFailed,
    /// Sustained overload evicted the oldest messages. Sets `count`.
    OutboundEvicted,

    // === Catalog ===
    /// Catalog replaced. Sets `count` (entries), `reason` ("live"/"cache").
    CatalogLoaded,
    /// Catalog fetch attempt failed. Sets `attempt`, `reason`.
    CatalogFetchFailed,

    // === Ticket flow ===
    /// No customer is waiting.
    QueueEmpty,
    /// Ticket shown. Sets `ticket`, `count` (estimate seconds).
    TicketAnnounced,
    /// Scan matched; advance issued. Sets `ticket`, `reason` on failure.
    TicketAdvanced,
    /// Deadline passed; skip issued. Sets `ticket`, `reason` on failure.
    TicketSkipped,
    /// A scan did not match the displayed ticket. Sets `ticket` (scanned).
    ScanIgnored,
    /// New customer record created. Sets `ticket`.
    CustomerCreated,
}

/// Device event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Task or operation name, if applicable.
    pub task: Option<Arc<str>>,
    /// Human-readable reason (errors, topics, sources).
    pub reason: Option<Arc<str>>,
    /// Ticket the event refers to.
    pub ticket: Option<TicketId>,
    /// Generic count (entries, evicted messages, seconds).
    pub count: Option<u64>,
    /// Attempt number (starting from 1).
    pub attempt: Option<u32>,
    /// Duration in milliseconds (compact).
    pub delay_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            reason: None,
            ticket: None,
            count: None,
            attempt: None,
            delay_ms: None,
        }
    }

    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[inline]
    pub fn with_ticket(mut self, ticket: TicketId) -> Self {
        self.ticket = Some(ticket);
        self
    }

    #[inline]
    pub fn with_count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a duration (stored as milliseconds, saturating).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(d.as_millis().min(u128::from(u32::MAX)) as u32);
        self
    }
}
