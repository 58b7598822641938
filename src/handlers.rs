//! # One-shot remote operations.
//!
//! Each handler checks admission, takes the [`BusyLock`] where the operation
//! is sensitive, issues one remote call and reports failures as diagnostics.
//! None of them retries synchronously except the catalog fetch, which runs
//! under a bounded [`RetryPolicy`].
//!
//! | Handler           | Lock | Diagnostics                                               |
//! |-------------------|------|-----------------------------------------------------------|
//! | `refresh_catalog` | yes  | `init:network_not_ready`, `busy:refresh_catalog`, `failed` |
//! | `new_customer`    | yes  | `nc:network_not_ready`, `busy:new_customer`, `nc:failed`   |
//! | `next_ticket`     | yes  | `nt:network_not_ready`, `nt:failed:<label>`                |
//! | `current_ticket`  | no   | `ct:network_not_ready`, `ct:failed:<label>`                |
//! | `skip_ticket`     | no   | `st:network_not_ready`, `st:failed`                        |
//! | `bootstrap_catalog` | yes | `init_fetch_failed`, `json_err:init`, `init_retrying`     |
//!
//! Every handler has a `spawn_*` twin that runs it as a detached tokio task.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::busy::{BusyGuard, BusyLock};
use crate::catalog::{CatalogStore, ItemCatalog, SharedCatalog};
use crate::config::Config;
use crate::connectivity::Connectivity;
use crate::error::{ApiError, HandlerError};
use crate::events::{Bus, Event, EventKind};
use crate::flow::QueueHint;
use crate::outbound::Reporter;
use crate::policies::RetryPolicy;
use crate::remote::{AdvanceOutcome, BakeryApi, Ticket, TicketId};
use crate::status::{DeviceStatus, StatusPanel};

/// How often the bootstrap looks at the admission gate while it is closed.
const READY_POLL: Duration = Duration::from_millis(250);

/// Shared state every handler needs.
pub struct Handlers {
    api: Arc<dyn BakeryApi>,
    connectivity: Arc<Connectivity>,
    lock: BusyLock,
    reporter: Reporter,
    panel: Arc<StatusPanel>,
    catalog: SharedCatalog,
    store: CatalogStore,
    hint: Arc<QueueHint>,
    bus: Bus,
    busy_timeout: Duration,
    catalog_capacity: usize,
    retry: RetryPolicy,
    init_retry_delay: Duration,
}

/// Collaborators of [`Handlers`].
pub struct HandlerDeps {
    pub api: Arc<dyn BakeryApi>,
    pub connectivity: Arc<Connectivity>,
    pub lock: BusyLock,
    pub reporter: Reporter,
    pub panel: Arc<StatusPanel>,
    pub catalog: SharedCatalog,
    pub store: CatalogStore,
    pub hint: Arc<QueueHint>,
    pub bus: Bus,
}

impl Handlers {
    pub fn new(cfg: &Config, deps: HandlerDeps) -> Self {
        Self {
            api: deps.api,
            connectivity: deps.connectivity,
            lock: deps.lock,
            reporter: deps.reporter,
            panel: deps.panel,
            catalog: deps.catalog,
            store: deps.store,
            hint: deps.hint,
            bus: deps.bus,
            busy_timeout: cfg.busy_timeout,
            catalog_capacity: cfg.catalog_capacity,
            retry: RetryPolicy::new(cfg.http_retries, cfg.http_retry_delay),
            init_retry_delay: cfg.init_retry_delay,
        }
    }

    pub fn catalog(&self) -> &SharedCatalog {
        &self.catalog
    }

    pub fn hint(&self) -> &Arc<QueueHint> {
        &self.hint
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    pub fn panel(&self) -> &Arc<StatusPanel> {
        &self.panel
    }

    /// Whether a remote call would be admitted right now.
    pub fn is_ready_for_calls(&self) -> bool {
        self.connectivity.is_ready_for_calls()
    }

    fn admit(&self, code: &'static str) -> Result<(), HandlerError> {
        if self.is_ready_for_calls() {
            Ok(())
        } else {
            self.reporter.error(code);
            Err(HandlerError::NotReady)
        }
    }

    async fn acquire(&self, op: &'static str) -> Result<BusyGuard, HandlerError> {
        match self.lock.try_acquire(self.busy_timeout).await {
            Some(guard) => Ok(guard),
            None => {
                self.bus
                    .publish(Event::new(EventKind::LockContended).with_task(op));
                Err(HandlerError::Busy)
            }
        }
    }

    /// Refetches the catalog on request (control-topic message).
    ///
    /// Returns the number of catalog entries.
    pub async fn refresh_catalog(&self) -> Result<usize, HandlerError> {
        self.admit("init:network_not_ready")?;
        let _guard = self.acquire("refresh_catalog").await.inspect_err(|_| {
            self.reporter.error("busy:refresh_catalog");
        })?;

        self.fetch_catalog().await.map_err(|e| {
            self.reporter.error("failed");
            HandlerError::Api(e)
        })
    }

    /// Loads the cached catalog, then fetches a live one, retrying every
    /// `init_retry_delay` until it succeeds or `ctx` is cancelled.
    ///
    /// Each round waits for admission and holds the busy lock across the
    /// fetch and the cache write. Returns `false` when cancelled first.
    pub async fn bootstrap_catalog(&self, ctx: &CancellationToken) -> bool {
        if let Some(cached) = self.store.load(self.catalog_capacity) {
            let n = cached.len();
            self.catalog.replace(cached);
            self.bus.publish(
                Event::new(EventKind::CatalogLoaded)
                    .with_count(n as u64)
                    .with_reason("cache"),
            );
        }

        self.panel.set_status(DeviceStatus::ApiWaiting);
        loop {
            while !self.is_ready_for_calls() {
                tokio::select! {
                    _ = ctx.cancelled() => return false,
                    _ = tokio::time::sleep(READY_POLL) => {}
                }
            }
            let fetched = match self.acquire("bootstrap_catalog").await {
                Ok(_guard) => self.fetch_catalog().await.is_ok(),
                Err(_) => false,
            };
            if fetched {
                break;
            }
            self.reporter.error("init_retrying");
            tokio::select! {
                _ = ctx.cancelled() => return false,
                _ = tokio::time::sleep(self.init_retry_delay) => {}
            }
        }
        self.panel.set_status(DeviceStatus::Normal);
        true
    }

    /// Fetch with retry, then replace and persist.
    async fn fetch_catalog(&self) -> Result<usize, ApiError> {
        let api = &self.api;
        let entries = self
            .retry
            .run(
                move |_| api.fetch_catalog(),
                |attempt, e: &ApiError| {
                    self.bus.publish(
                        Event::new(EventKind::CatalogFetchFailed)
                            .with_attempt(attempt)
                            .with_reason(e.to_string()),
                    );
                },
            )
            .await
            .inspect_err(|e| {
                self.reporter.error(match e {
                    ApiError::Decode(_) => "json_err:init",
                    _ => "init_fetch_failed",
                });
            })?;

        let catalog = ItemCatalog::from_entries(entries, self.catalog_capacity);
        let n = catalog.len();
        if let Err(e) = self.store.save(&catalog) {
            tracing::warn!(error = %e, "catalog cache not written");
        }
        self.catalog.replace(catalog);
        self.bus.publish(
            Event::new(EventKind::CatalogLoaded)
                .with_count(n as u64)
                .with_reason("live"),
        );
        Ok(n)
    }

    /// Submits a new customer. `quantities` are positional against the
    /// catalog order; missing positions count as zero.
    pub async fn new_customer(&self, quantities: &[u32]) -> Result<TicketId, HandlerError> {
        self.admit("nc:network_not_ready")?;
        let _guard = self.acquire("new_customer").await.inspect_err(|_| {
            self.reporter.error("busy:new_customer");
        })?;

        self.panel.set_status(DeviceStatus::ApiWaiting);
        let items = self.catalog.positional(quantities);
        let res = self.api.new_customer(&items).await;
        self.hint.set(true);

        match res {
            Ok(ticket) => {
                self.panel.set_status(DeviceStatus::Normal);
                self.bus
                    .publish(Event::new(EventKind::CustomerCreated).with_ticket(ticket));
                Ok(ticket)
            }
            Err(e) => {
                self.panel.set_status(DeviceStatus::ApiError);
                self.reporter.error("nc:failed");
                Err(e.into())
            }
        }
    }

    /// Advances past `ticket` while holding the busy lock.
    ///
    /// A lock timeout is silent apart from the contention event.
    pub async fn next_ticket(&self, ticket: TicketId) -> Result<AdvanceOutcome, HandlerError> {
        self.admit("nt:network_not_ready")?;
        let _guard = self.acquire("next_ticket").await?;

        self.panel.set_status(DeviceStatus::ApiWaiting);
        let res = self.call_advance(ticket).await;
        self.panel.set_status(if res.is_ok() {
            DeviceStatus::Normal
        } else {
            DeviceStatus::ApiError
        });
        res
    }

    /// Advances past `ticket` without the busy lock (ticket flow path).
    pub async fn advance_ticket(&self, ticket: TicketId) -> Result<AdvanceOutcome, HandlerError> {
        self.admit("nt:network_not_ready")?;
        self.call_advance(ticket).await
    }

    async fn call_advance(&self, ticket: TicketId) -> Result<AdvanceOutcome, HandlerError> {
        self.api.advance_ticket(ticket).await.map_err(|e| {
            self.reporter.error(format!("nt:failed:{}", e.as_label()));
            HandlerError::Api(e)
        })
    }

    /// Queries the ticket being served; `Ok(None)` when no customer waits.
    pub async fn current_ticket(&self) -> Result<Option<Ticket>, HandlerError> {
        self.admit("ct:network_not_ready")?;
        self.api.current_ticket().await.map_err(|e| {
            self.reporter.error(format!("ct:failed:{}", e.as_label()));
            HandlerError::Api(e)
        })
    }

    /// Moves `ticket` to the skipped list.
    pub async fn skip_ticket(&self, ticket: TicketId) -> Result<(), HandlerError> {
        self.admit("st:network_not_ready")?;
        self.api.skip_ticket(ticket).await.map_err(|e| {
            self.reporter.error("st:failed");
            HandlerError::Api(e)
        })
    }

    pub fn spawn_refresh_catalog(self: &Arc<Self>) -> JoinHandle<Result<usize, HandlerError>> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.refresh_catalog().await })
    }

    pub fn spawn_new_customer(
        self: &Arc<Self>,
        quantities: Vec<u32>,
    ) -> JoinHandle<Result<TicketId, HandlerError>> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.new_customer(&quantities).await })
    }

    pub fn spawn_next_ticket(
        self: &Arc<Self>,
        ticket: TicketId,
    ) -> JoinHandle<Result<AdvanceOutcome, HandlerError>> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.next_ticket(ticket).await })
    }

    pub fn spawn_current_ticket(self: &Arc<Self>) -> JoinHandle<Result<Option<Ticket>, HandlerError>> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.current_ticket().await })
    }

    pub fn spawn_skip_ticket(self: &Arc<Self>, ticket: TicketId) -> JoinHandle<Result<(), HandlerError>> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.skip_ticket(ticket).await })
    }
}
