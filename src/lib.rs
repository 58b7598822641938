//! # ticketvisor
//!
//! **Ticketvisor** is the coordination core of a bakery ticket-queue device.
//! It polls a remote service for the customer being served, announces the
//! ticket with a cook-time estimate, waits for a scan or a timeout, and
//! advances the queue, while keeping the device's network, message bus and
//! shared resources in a consistent state.
//!
//! Hardware and transports are reached only through traits
//! ([`Link`], [`MessageBus`], [`Display`], [`KeyValueStore`], [`Restart`],
//! [`BakeryApi`]); the crate never hard-wires a board or a broker.
//!
//! ## Architecture
//! ```text
//!  ┌──────────────────┐ ┌────────────────┐ ┌──────────────┐ ┌─────────────────┐
//!  │ ConnectivityLoop │ │ OutboundWorker │ │  TicketFlow  │ │ DeadlockMonitor │
//!  │  (100ms tick)    │ │  (50ms tick)   │ │ (one cycle   │ │   (1s tick)     │
//!  │                  │ │                │ │  at a time)  │ │                 │
//!  └───┬─────────┬────┘ └──────┬─────────┘ └──────┬───────┘ └────────┬────────┘
//!      │ control │             │ drain            │ admit / call     │ observe
//!      │ topic   ▼             ▼                  ▼                  ▼
//!      │   ┌──────────┐  ┌───────────────┐  ┌─────────────┐    ┌──────────┐
//!      └──►│ Handlers │─►│ OutboundQueue │◄─│ Connectivity│    │ BusyLock │
//!          │ (one-shot│  │ (bounded FIFO)│  │ (admission) │    │ (1 slot) │
//!          │  calls)  │  └───────────────┘  └─────────────┘    └──────────┘
//!          └────┬─────┘           ▲                                  ▲
//!               │ BakeryApi       │ Reporter (diagnostics)           │
//!               ▼                 │                                  │
//!          remote service ────────┴──────── sensitive calls ─────────┘
//!
//!  every component ── Event ──► Bus ──► SubscriberSet ──► LogWriter (tracing)
//! ```
//!
//! ## Features
//! | Area             | Description                                              | Key types                                  |
//! |------------------|----------------------------------------------------------|--------------------------------------------|
//! | **Busy lock**    | Scoped exclusive access, deadlock-triggered restart      | [`BusyLock`], [`DeadlockMonitor`]          |
//! | **Outbound**     | Bounded queue, single delivery worker, overload eviction | [`OutboundQueue`], [`OutboundWorker`]      |
//! | **Connectivity** | Link/broker reconnection and request admission           | [`Connectivity`], [`ConnectivityState`]    |
//! | **Ticket flow**  | Poll, announce, scan-or-timeout, advance                 | [`TicketFlow`], [`CycleOutcome`]           |
//! | **Handlers**     | One-shot remote operations                               | [`Handlers`]                               |
//! | **Runtime**      | Wiring, supervision, graceful shutdown                   | [`Device`], [`DeviceBuilder`]              |
//! | **Events**       | Typed diagnostics rendered through `tracing`             | [`Event`], [`Subscribe`], [`LogWriter`]    |
//! | **Errors**       | Typed errors per concern                                 | [`ApiError`], [`HandlerError`], [`RuntimeError`] |
//! | **Config**       | Defaults plus TOML/environment layering                  | [`Config`]                                 |
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use ticketvisor::{Config, Device, InboundMessage, Link, MessageBus, OutboundMessage, PortError};
//!
//! struct Wired;
//!
//! #[async_trait]
//! impl Link for Wired {
//!     fn is_up(&self) -> bool { true }
//!     async fn begin_connect(&self) {}
//! }
//!
//! struct Loopback;
//!
//! #[async_trait]
//! impl MessageBus for Loopback {
//!     fn is_connected(&self) -> bool { true }
//!     async fn connect(&self, _client_id: &str) -> Result<(), PortError> { Ok(()) }
//!     async fn subscribe(&self, _topic: &str) -> Result<(), PortError> { Ok(()) }
//!     async fn poll(&self) -> Vec<InboundMessage> { Vec::new() }
//!     async fn publish(&self, _msg: &OutboundMessage) -> Result<(), PortError> { Ok(()) }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     ticketvisor::logging::init();
//!
//!     let cfg = Config::load(Some("ticketvisor.toml".as_ref()))?;
//!     let device = Device::builder(cfg)
//!         .link(Arc::new(Wired))
//!         .message_bus(Arc::new(Loopback))
//!         .build()?;
//!
//!     device.run().await?;
//!     Ok(())
//! }
//! ```
mod busy;
mod catalog;
mod config;
mod connectivity;
mod core;
mod error;
mod events;
mod flow;
mod handlers;
pub mod logging;
mod outbound;
mod policies;
mod ports;
mod remote;
mod scan;
mod status;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use busy::{BusyGuard, BusyLock, DeadlockMonitor, DEADLOCK_DIAGNOSTIC};
pub use catalog::{CatalogStore, ItemCatalog, SharedCatalog};
pub use config::{Config, ENV_PREFIX};
pub use connectivity::{Connectivity, ConnectivityLoop, ConnectivityState};
pub use crate::core::{Device, DeviceBuilder, RestartSignal};
pub use error::{ApiError, ConfigError, HandlerError, QueueError, RuntimeError, TaskError};
pub use events::{Bus, Event, EventKind};
pub use flow::{CycleOutcome, FlowState, QueueHint, TicketFlow};
pub use handlers::{HandlerDeps, Handlers};
pub use outbound::{OutboundMessage, OutboundQueue, OutboundWorker, OverflowGuard, Reporter};
pub use policies::{RetryPolicy, Retryable};
pub use ports::{
    Display, InboundMessage, KeyValueStore, Link, MemoryStore, MessageBus, NullDisplay, PortError,
    Restart,
};
pub use remote::{
    AdvanceOutcome, BakeryApi, HttpApiConfig, HttpBakeryApi, ItemId, Quantities, Ticket, TicketId,
};
pub use scan::ScanSlot;
pub use status::{DeviceStatus, StatusPanel};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use tasks::{Task, TaskRef};
