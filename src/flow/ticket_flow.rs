//! # TicketFlow: one customer at a time.
//!
//! ```text
//! IdleWait ──► Poll ──ticket──► Announce ──► AwaitScan ──scan/deadline──► Advance ─┐
//!    ▲          │                                                                  │
//!    └──empty───┘◄─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **IdleWait**: while the last poll saw an empty queue and less than
//!   `recheck_interval` has passed since, sleep `idle_sleep` and look again.
//! - **Poll**: query the current ticket (no busy lock). An empty queue or a
//!   failed query records "queue empty"; a closed admission gate abandons the
//!   cycle and leaves the hint alone.
//! - **Announce**: show the ticket, then the cook-time estimate; the deadline is
//!   `now + estimate`, the estimate capped at the 999 minutes the display can show.
//! - **AwaitScan**: every `scan_poll_interval`, a scan for the ticket advances
//!   it (result held on the display for `result_hold`); otherwise a passed
//!   deadline skips it. A scan seen in the same round as the deadline wins.
//!   A scan is only consumed while admission is open; a closed gate abandons
//!   the cycle and leaves the scan pending for the next one.
//! - **Advance**: entered right before the advance or skip call.
//!
//! Only one flow runs; the cycle is strictly sequential.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{HandlerError, TaskError};
use crate::events::{Bus, Event, EventKind};
use crate::handlers::Handlers;
use crate::remote::{Ticket, TicketId};
use crate::scan::ScanSlot;
use crate::tasks::Task;

/// Longest wait for a scan, matching the display's 999-minute cap.
const MAX_SCAN_WAIT: Duration = Duration::from_secs(999 * 60);

/// Current step of the flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    IdleWait,
    Poll,
    Announce,
    AwaitScan,
    Advance,
}

/// How one cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No customer waiting, or the query failed.
    Empty,
    /// Admission was closed when a remote call was due.
    Abandoned,
    /// The ticket was scanned and advanced.
    Advanced(TicketId),
    /// The deadline passed and the ticket was skipped.
    Skipped(TicketId),
}

pub struct TicketFlow {
    handlers: Arc<Handlers>,
    scans: Arc<ScanSlot>,
    bus: Bus,
    state: watch::Sender<FlowState>,
    last_poll: Mutex<Option<Instant>>,
    recheck_interval: Duration,
    idle_sleep: Duration,
    scan_poll_interval: Duration,
    result_hold: Duration,
}

impl TicketFlow {
    pub fn new(cfg: &Config, handlers: Arc<Handlers>, scans: Arc<ScanSlot>, bus: Bus) -> Self {
        let (state, _) = watch::channel(FlowState::IdleWait);
        Self {
            handlers,
            scans,
            bus,
            state,
            last_poll: Mutex::new(None),
            recheck_interval: cfg.recheck_interval,
            idle_sleep: cfg.idle_sleep,
            scan_poll_interval: cfg.scan_poll_interval,
            result_hold: cfg.result_hold,
        }
    }

    /// Observes state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<FlowState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> FlowState {
        *self.state.borrow()
    }

    fn enter(&self, s: FlowState) {
        self.state.send_replace(s);
    }

    /// Whether IdleWait may hand over to Poll at `now`.
    pub fn should_poll(&self, now: Instant) -> bool {
        if self.handlers.hint().get() {
            return true;
        }
        match *self.last_poll.lock() {
            None => true,
            Some(at) => now.saturating_duration_since(at) >= self.recheck_interval,
        }
    }

    async fn idle_wait(&self) {
        self.enter(FlowState::IdleWait);
        while !self.should_poll(Instant::now()) {
            tokio::time::sleep(self.idle_sleep).await;
        }
    }

    /// Runs Poll through Advance once.
    pub async fn run_cycle(&self) -> CycleOutcome {
        self.enter(FlowState::Poll);
        let polled_at = Instant::now();
        let ticket = match self.handlers.current_ticket().await {
            Err(HandlerError::NotReady) => return CycleOutcome::Abandoned,
            res => {
                *self.last_poll.lock() = Some(polled_at);
                res.ok().flatten()
            }
        };
        let Some(ticket) = ticket else {
            self.handlers.hint().set(false);
            self.bus.publish(Event::new(EventKind::QueueEmpty));
            return CycleOutcome::Empty;
        };
        self.handlers.hint().set(true);

        self.enter(FlowState::Announce);
        let deadline = self.announce(&ticket);

        self.enter(FlowState::AwaitScan);
        self.await_scan(ticket.id, deadline).await
    }

    fn announce(&self, ticket: &Ticket) -> Instant {
        let panel = self.handlers.panel();
        let estimate = self.handlers.catalog().estimate(&ticket.items);
        panel.show_ticket(ticket.id);
        panel.show_estimate(estimate);
        self.bus.publish(
            Event::new(EventKind::TicketAnnounced)
                .with_ticket(ticket.id)
                .with_count(estimate.as_secs()),
        );
        Instant::now() + estimate.min(MAX_SCAN_WAIT)
    }

    async fn await_scan(&self, ticket: TicketId, deadline: Instant) -> CycleOutcome {
        let mut ignored = None;
        loop {
            if self.scans.peek() == Some(ticket) {
                if !self.handlers.is_ready_for_calls() {
                    return CycleOutcome::Abandoned;
                }
                if self.scans.take_if(ticket) {
                    self.enter(FlowState::Advance);
                    return self.advance(ticket).await;
                }
            }
            if let Some(other) = self.scans.peek() {
                if ignored != Some(other) {
                    ignored = Some(other);
                    self.bus
                        .publish(Event::new(EventKind::ScanIgnored).with_ticket(other));
                }
            }
            if Instant::now() >= deadline {
                self.enter(FlowState::Advance);
                return self.skip(ticket).await;
            }
            tokio::time::sleep(self.scan_poll_interval).await;
        }
    }

    async fn advance(&self, ticket: TicketId) -> CycleOutcome {
        match self.handlers.advance_ticket(ticket).await {
            Ok(outcome) => {
                self.handlers.panel().show_quantities(&outcome.items);
                self.bus
                    .publish(Event::new(EventKind::TicketAdvanced).with_ticket(ticket));
                tokio::time::sleep(self.result_hold).await;
                CycleOutcome::Advanced(ticket)
            }
            Err(HandlerError::NotReady) => {
                // admission closed between the check and the call
                self.scans.restore(ticket);
                CycleOutcome::Abandoned
            }
            Err(e) => {
                self.bus.publish(
                    Event::new(EventKind::TicketAdvanced)
                        .with_ticket(ticket)
                        .with_reason(e.to_string()),
                );
                CycleOutcome::Advanced(ticket)
            }
        }
    }

    async fn skip(&self, ticket: TicketId) -> CycleOutcome {
        match self.handlers.skip_ticket(ticket).await {
            Ok(()) => {
                self.bus
                    .publish(Event::new(EventKind::TicketSkipped).with_ticket(ticket));
                CycleOutcome::Skipped(ticket)
            }
            Err(HandlerError::NotReady) => CycleOutcome::Abandoned,
            Err(e) => {
                self.bus.publish(
                    Event::new(EventKind::TicketSkipped)
                        .with_ticket(ticket)
                        .with_reason(e.to_string()),
                );
                CycleOutcome::Skipped(ticket)
            }
        }
    }
}

#[async_trait]
impl Task for TicketFlow {
    fn name(&self) -> &str {
        "ticket-flow"
    }

    async fn run(&self, ctx: CancellationToken) -> Result<(), TaskError> {
        loop {
            let outcome = tokio::select! {
                _ = ctx.cancelled() => return Ok(()),
                out = async {
                    self.idle_wait().await;
                    self.run_cycle().await
                } => out,
            };
            if matches!(outcome, CycleOutcome::Empty | CycleOutcome::Abandoned) {
                tokio::select! {
                    _ = ctx.cancelled() => return Ok(()),
                    _ = tokio::time::sleep(self.idle_sleep) => {}
                }
            }
        }
    }
}
