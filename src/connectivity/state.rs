//! # Connectivity state machine.
//!
//! ```text
//!            link up                     broker connect ok
//! LinkDown ──────────► LinkUpBrokerDown ──────────────────► Ready
//!    ▲                   │   ▲                                │
//!    └──── link lost ────┘   └──────── broker lost ───────────┤
//!    ▲                                                        │
//!    └──────────────────────── link lost ─────────────────────┘
//! ```
//!
//! Link and broker attempts are paced by two separate timers
//! (`link_retry_interval`, `broker_retry_interval`). A timer with no previous
//! attempt is due immediately; timers are never reset by phase changes.
//!
//! The admission block is a separate flag. It is set whenever the link is down
//! or a broker attempt fails, can be set on demand with
//! [`Connectivity::block_admission`], and is cleared only by a successful
//! broker connect. `Ready` never coexists with the block: blocking from
//! `Ready` drops back to `LinkUpBrokerDown`, so the broker timer drives the
//! reconnect that clears it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::config::Config;
use crate::events::{Bus, Event, EventKind};
use crate::ports::{InboundMessage, Link, MessageBus};
use crate::status::{DeviceStatus, StatusPanel};

/// Connectivity phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    LinkDown,
    LinkUpBrokerDown,
    Ready,
}

#[derive(Debug)]
struct Timers {
    state: ConnectivityState,
    last_link_attempt: Option<Instant>,
    last_broker_attempt: Option<Instant>,
}

fn due(last: Option<Instant>, interval: Duration, now: Instant) -> bool {
    last.is_none_or(|at| now.saturating_duration_since(at) >= interval)
}

/// Link + broker session supervisor and request admission gate.
pub struct Connectivity {
    link: Arc<dyn Link>,
    session: Arc<dyn MessageBus>,
    panel: Arc<StatusPanel>,
    bus: Bus,
    client_id: String,
    control_topic: String,
    link_retry: Duration,
    broker_retry: Duration,
    inner: Mutex<Timers>,
    blocked: AtomicBool,
}

impl Connectivity {
    pub fn new(
        cfg: &Config,
        link: Arc<dyn Link>,
        session: Arc<dyn MessageBus>,
        panel: Arc<StatusPanel>,
        bus: Bus,
    ) -> Self {
        Self {
            link,
            session,
            panel,
            bus,
            client_id: cfg.device_id.clone(),
            control_topic: cfg.control_topic(),
            link_retry: cfg.link_retry_interval,
            broker_retry: cfg.broker_retry_interval,
            inner: Mutex::new(Timers {
                state: ConnectivityState::LinkDown,
                last_link_attempt: None,
                last_broker_attempt: None,
            }),
            blocked: AtomicBool::new(true),
        }
    }

    /// Current phase.
    pub fn state(&self) -> ConnectivityState {
        self.inner.lock().state
    }

    /// `true` only in `Ready` with the admission block cleared.
    pub fn is_ready_for_calls(&self) -> bool {
        self.state() == ConnectivityState::Ready && !self.blocked.load(Ordering::Acquire)
    }

    /// Blocks admission. From `Ready` this falls back to `LinkUpBrokerDown`
    /// until the next broker connect.
    pub fn block_admission(&self) {
        let mut t = self.inner.lock();
        self.blocked.store(true, Ordering::Release);
        if t.state == ConnectivityState::Ready {
            t.state = ConnectivityState::LinkUpBrokerDown;
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::Acquire)
    }

    /// Topic whose messages request a catalog refresh.
    pub fn control_topic(&self) -> &str {
        &self.control_topic
    }

    /// Advances the state machine once; in `Ready` returns the inbound
    /// messages received since the previous tick.
    pub async fn tick(&self, now: Instant) -> Vec<InboundMessage> {
        match self.state() {
            ConnectivityState::LinkDown => {
                self.tick_link_down(now).await;
                Vec::new()
            }
            ConnectivityState::LinkUpBrokerDown => {
                self.tick_broker_down(now).await;
                Vec::new()
            }
            ConnectivityState::Ready => self.tick_ready().await,
        }
    }

    async fn tick_link_down(&self, now: Instant) {
        self.block_admission();
        if self.panel.status() != DeviceStatus::LinkError {
            self.panel.set_status(DeviceStatus::LinkError);
        }

        if self.link.is_up() {
            self.inner.lock().state = ConnectivityState::LinkUpBrokerDown;
            return;
        }

        let attempt = {
            let mut t = self.inner.lock();
            let attempt = due(t.last_link_attempt, self.link_retry, now);
            if attempt {
                t.last_link_attempt = Some(now);
            }
            attempt
        };
        if attempt {
            self.link.begin_connect().await;
        }
    }

    async fn tick_broker_down(&self, now: Instant) {
        if !self.link.is_up() {
            self.enter_link_down();
            return;
        }

        {
            let mut t = self.inner.lock();
            if !due(t.last_broker_attempt, self.broker_retry, now) {
                return;
            }
            t.last_broker_attempt = Some(now);
        }

        let connected = match self.session.connect(&self.client_id).await {
            Ok(()) => self.session.subscribe(&self.control_topic).await,
            Err(e) => Err(e),
        };
        match connected {
            Ok(()) => {
                {
                    let mut t = self.inner.lock();
                    self.blocked.store(false, Ordering::Release);
                    t.state = ConnectivityState::Ready;
                }
                self.panel.set_status(DeviceStatus::Normal);
                self.bus.publish(Event::new(EventKind::ConnectivityReady));
            }
            Err(e) => {
                self.block_admission();
                self.panel.set_status(DeviceStatus::BrokerError);
                self.bus
                    .publish(Event::new(EventKind::BrokerDown).with_reason(e.to_string()));
            }
        }
    }

    async fn tick_ready(&self) -> Vec<InboundMessage> {
        if !self.link.is_up() {
            self.enter_link_down();
            return Vec::new();
        }
        if !self.session.is_connected() {
            self.inner.lock().state = ConnectivityState::LinkUpBrokerDown;
            self.panel.set_status(DeviceStatus::BrokerError);
            self.bus
                .publish(Event::new(EventKind::BrokerDown).with_reason("session lost"));
            return Vec::new();
        }
        self.session.poll().await
    }

    fn enter_link_down(&self) {
        self.inner.lock().state = ConnectivityState::LinkDown;
        self.block_admission();
        self.panel.set_status(DeviceStatus::LinkError);
        self.bus.publish(Event::new(EventKind::LinkDown));
    }
}
