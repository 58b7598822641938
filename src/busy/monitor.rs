//! # DeadlockMonitor: forced recovery from a stuck busy lock.
//!
//! Every `interval`, if the [`BusyLock`] has been held longer than `ceiling`
//! the device is restarted. The stuck holder is not diagnosed or released;
//! past the ceiling its state is not trusted.
//!
//! A restart is requested once per episode. An episode is identified by the
//! holder's acquisition instant, so repeated checks before the restart takes
//! effect do not request it again, while a later, separate stuck holder does.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::BusyLock;
use crate::config::Config;
use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};
use crate::outbound::Reporter;
use crate::ports::Restart;
use crate::tasks::Task;

/// Diagnostic sent before restarting.
pub const DEADLOCK_DIAGNOSTIC: &str = "deadlock_detected_rebooting";

/// Periodic watchdog over the [`BusyLock`].
pub struct DeadlockMonitor {
    lock: BusyLock,
    restart: Arc<dyn Restart>,
    reporter: Reporter,
    bus: Bus,
    ceiling: Duration,
    interval: Duration,
    fired_for: Mutex<Option<Instant>>,
}

impl DeadlockMonitor {
    pub fn new(
        cfg: &Config,
        lock: BusyLock,
        restart: Arc<dyn Restart>,
        reporter: Reporter,
        bus: Bus,
    ) -> Self {
        Self {
            lock,
            restart,
            reporter,
            bus,
            ceiling: cfg.deadlock_ceiling,
            interval: cfg.deadlock_check_interval,
            fired_for: Mutex::new(None),
        }
    }

    /// Runs one check at `now`; returns `true` when it requested a restart.
    pub fn check(&self, now: Instant) -> bool {
        let Some(since) = self.lock.held_since() else {
            return false;
        };
        let held = now.saturating_duration_since(since);
        if held <= self.ceiling {
            return false;
        }

        {
            let mut fired = self.fired_for.lock();
            if *fired == Some(since) {
                return false;
            }
            *fired = Some(since);
        }

        self.reporter.error(DEADLOCK_DIAGNOSTIC);
        self.bus
            .publish(Event::new(EventKind::DeadlockDetected).with_delay(held));
        self.restart.restart(DEADLOCK_DIAGNOSTIC);
        true
    }
}

#[async_trait]
impl Task for DeadlockMonitor {
    fn name(&self) -> &str {
        "deadlock-monitor"
    }

    async fn run(&self, ctx: CancellationToken) -> Result<(), TaskError> {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = ctx.cancelled() => return Ok(()),
                now = ticker.tick() => { self.check(now); }
            }
        }
    }
}
