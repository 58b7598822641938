//! # LogWriter: renders device events through `tracing`.
//!
//! Healthy-path events log at `info`/`debug`, degradations at `warn`,
//! deadlock and task failures at `error`.

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let task = e.task.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::TaskStarting => tracing::debug!(seq = e.seq, task, "task starting"),
            EventKind::TaskStopped => tracing::info!(seq = e.seq, task, "task stopped"),
            EventKind::TaskFailed => tracing::error!(seq = e.seq, task, reason, "task failed"),
            EventKind::ShutdownRequested => tracing::info!(seq = e.seq, "shutdown requested"),
            EventKind::AllStoppedWithin => tracing::info!(seq = e.seq, "all tasks stopped within grace"),
            EventKind::GraceExceeded => tracing::warn!(seq = e.seq, "grace exceeded"),
            EventKind::LockContended => tracing::warn!(seq = e.seq, operation = task, "busy lock contended"),
            EventKind::DeadlockDetected => {
                tracing::error!(seq = e.seq, held_ms = e.delay_ms, "deadlock detected, restarting")
            }
            EventKind::LinkDown => tracing::warn!(seq = e.seq, "link down"),
            EventKind::BrokerDown => tracing::warn!(seq = e.seq, reason, "broker session down"),
            EventKind::ConnectivityReady => tracing::info!(seq = e.seq, "connectivity ready"),
            EventKind::OutboundDropped => tracing::warn!(seq = e.seq, reason, "outbound message dropped"),
            EventKind::PublishFailed => tracing::warn!(seq = e.seq, reason, "publish failed"),
            EventKind::OutboundEvicted => {
                tracing::warn!(seq = e.seq, evicted = e.count, "outbound queue overflow")
            }
            EventKind::CatalogLoaded => {
                tracing::info!(seq = e.seq, entries = e.count, source = reason, "catalog loaded")
            }
            EventKind::CatalogFetchFailed => {
                tracing::warn!(seq = e.seq, attempt = e.attempt, reason, "catalog fetch failed")
            }
            EventKind::QueueEmpty => tracing::debug!(seq = e.seq, "no customer waiting"),
            EventKind::TicketAnnounced => {
                tracing::info!(seq = e.seq, ticket = e.ticket, estimate_s = e.count, "ticket announced")
            }
            EventKind::TicketAdvanced => {
                tracing::info!(seq = e.seq, ticket = e.ticket, reason, "ticket advanced")
            }
            EventKind::TicketSkipped => {
                tracing::info!(seq = e.seq, ticket = e.ticket, reason, "ticket skipped")
            }
            EventKind::ScanIgnored => tracing::debug!(seq = e.seq, scanned = e.ticket, "scan ignored"),
            EventKind::CustomerCreated => {
                tracing::info!(seq = e.seq, ticket = e.ticket, "customer created")
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
