//! # Device: wires the components and supervises the long-running tasks.
//!
//! ## Wiring
//! ```text
//! DeviceBuilder(cfg, collaborators)
//!   └─► Bus, SubscriberSet(LogWriter + extra subscribers)
//!   └─► BusyLock, OutboundQueue + Reporter, StatusPanel, SharedCatalog, ScanSlot, QueueHint
//!   └─► Connectivity ─► Handlers
//!   └─► tasks: ConnectivityLoop, OutboundWorker, TicketFlow, DeadlockMonitor
//! ```
//!
//! ## Run
//! ```text
//! run():
//!   subscriber_listener(): Bus ─► SubscriberSet::emit
//!   spawn every task with a child token of the runtime token
//!   spawn the catalog bootstrap
//!   wait for the first of:
//!     ├─ OS signal          ─► ShutdownRequested, cancel, wait grace ─► Ok / GraceExceeded
//!     ├─ restart requested  ─► cancel, wait grace                    ─► RestartRequested
//!     ├─ fatal task error   ─► cancel, wait grace                    ─► Ok / GraceExceeded
//!     │  (a panicking task counts as fatal)
//!     └─ every task exited  ─► Ok
//! ```

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::alive::AliveSet;
use super::shutdown;
use crate::busy::{BusyLock, DeadlockMonitor};
use crate::catalog::{CatalogStore, SharedCatalog};
use crate::config::Config;
use crate::connectivity::{Connectivity, ConnectivityLoop};
use crate::error::{ConfigError, RuntimeError, TaskError};
use crate::events::{Bus, Event, EventKind};
use crate::flow::{QueueHint, TicketFlow};
use crate::handlers::{HandlerDeps, Handlers};
use crate::outbound::{OutboundQueue, OutboundWorker, Reporter};
use crate::ports::{Display, KeyValueStore, Link, MemoryStore, MessageBus, NullDisplay, Restart};
use crate::remote::{BakeryApi, HttpApiConfig, HttpBakeryApi};
use crate::scan::ScanSlot;
use crate::status::StatusPanel;
use crate::subscribers::{LogWriter, Subscribe, SubscriberSet};
use crate::tasks::TaskRef;

/// [`Restart`] that ends [`Device::run`] with [`RuntimeError::RestartRequested`].
///
/// The process owner (init system, container runtime) performs the actual
/// restart once `run` returns.
#[derive(Debug, Default)]
pub struct RestartSignal {
    token: CancellationToken,
    reason: Mutex<Option<String>>,
}

impl RestartSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a restart has been requested.
    pub fn is_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Reason of the first request.
    pub fn reason(&self) -> Option<String> {
        self.reason.lock().clone()
    }

    async fn requested(&self) {
        self.token.cancelled().await
    }
}

impl Restart for RestartSignal {
    fn restart(&self, reason: &str) {
        self.reason.lock().get_or_insert_with(|| reason.to_string());
        self.token.cancel();
    }
}

/// Assembles a [`Device`] from its configuration and collaborators.
///
/// `link` and `message_bus` are required. Without an explicit `api` the
/// [`HttpBakeryApi`] is built from the config; the display defaults to
/// [`NullDisplay`] and the store to [`MemoryStore`].
pub struct DeviceBuilder {
    cfg: Config,
    api: Option<Arc<dyn BakeryApi>>,
    link: Option<Arc<dyn Link>>,
    session: Option<Arc<dyn MessageBus>>,
    display: Option<Arc<dyn Display>>,
    store: Option<Arc<dyn KeyValueStore>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl DeviceBuilder {
    pub fn api(mut self, api: Arc<dyn BakeryApi>) -> Self {
        self.api = Some(api);
        self
    }

    pub fn link(mut self, link: Arc<dyn Link>) -> Self {
        self.link = Some(link);
        self
    }

    pub fn message_bus(mut self, session: Arc<dyn MessageBus>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn display(mut self, display: Arc<dyn Display>) -> Self {
        self.display = Some(display);
        self
    }

    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Adds an event subscriber next to the built-in [`LogWriter`].
    pub fn subscriber(mut self, sub: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(sub);
        self
    }

    /// Validates the config and wires every component.
    ///
    /// Must be called from within a tokio runtime (subscriber workers are spawned).
    pub fn build(self) -> Result<Device, ConfigError> {
        let cfg = self.cfg;
        cfg.validate()?;
        if cfg.catalog_fetch_worst_case() > cfg.deadlock_ceiling {
            tracing::warn!(
                worst_case_ms = cfg.catalog_fetch_worst_case().as_millis() as u64,
                ceiling_ms = cfg.deadlock_ceiling.as_millis() as u64,
                "a slow catalog fetch can outlast the deadlock ceiling"
            );
        }

        let link = self.link.ok_or_else(|| missing("link"))?;
        let session = self.session.ok_or_else(|| missing("message_bus"))?;
        let api: Arc<dyn BakeryApi> = match self.api {
            Some(api) => api,
            None => Arc::new(HttpBakeryApi::new(HttpApiConfig::from(&cfg))?),
        };
        let display: Arc<dyn Display> = match self.display {
            Some(display) => display,
            None => Arc::new(NullDisplay),
        };
        let store: Arc<dyn KeyValueStore> = match self.store {
            Some(store) => store,
            None => Arc::new(MemoryStore::new()),
        };

        let bus = Bus::new(cfg.bus_capacity);
        let mut subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
        subs.extend(self.subscribers);
        let subs = Arc::new(SubscriberSet::new(subs));

        let lock = BusyLock::new();
        let queue = Arc::new(OutboundQueue::new(cfg.queue_capacity, cfg.queue_lock_timeout));
        let reporter = Reporter::new(Arc::clone(&queue), cfg.errors_topic(), bus.clone());
        let panel = Arc::new(StatusPanel::new(display));
        let scans = Arc::new(ScanSlot::new());
        let restart = Arc::new(RestartSignal::new());

        let connectivity = Arc::new(Connectivity::new(
            &cfg,
            link,
            Arc::clone(&session),
            Arc::clone(&panel),
            bus.clone(),
        ));
        let handlers = Arc::new(Handlers::new(
            &cfg,
            HandlerDeps {
                api,
                connectivity: Arc::clone(&connectivity),
                lock: lock.clone(),
                reporter: reporter.clone(),
                panel,
                catalog: SharedCatalog::default(),
                store: CatalogStore::new(store),
                hint: Arc::new(QueueHint::new()),
                bus: bus.clone(),
            },
        ));

        let flow = Arc::new(TicketFlow::new(
            &cfg,
            Arc::clone(&handlers),
            Arc::clone(&scans),
            bus.clone(),
        ));
        let tasks: Vec<TaskRef> = vec![
            Arc::new(ConnectivityLoop::new(
                &cfg,
                Arc::clone(&connectivity),
                Arc::clone(&handlers),
            )),
            Arc::new(OutboundWorker::new(&cfg, queue, session, bus.clone())),
            flow.clone(),
            Arc::new(DeadlockMonitor::new(
                &cfg,
                lock.clone(),
                restart.clone(),
                reporter,
                bus.clone(),
            )),
        ];

        Ok(Device {
            cfg,
            bus,
            subs,
            lock,
            connectivity,
            handlers,
            flow,
            scans,
            restart,
            tasks,
            alive: AliveSet::default(),
        })
    }
}

/// Runs `task`, turning a panic into [`TaskError::Fatal`].
async fn run_guarded(task: &TaskRef, ctx: CancellationToken) -> Result<(), TaskError> {
    match AssertUnwindSafe(task.run(ctx)).catch_unwind().await {
        Ok(res) => res,
        Err(panic) => Err(TaskError::Fatal {
            error: format!("panicked: {}", panic_message(panic.as_ref())),
        }),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

fn missing(field: &'static str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: "collaborator not provided".to_string(),
    }
}

/// The assembled device.
pub struct Device {
    cfg: Config,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    lock: BusyLock,
    connectivity: Arc<Connectivity>,
    handlers: Arc<Handlers>,
    flow: Arc<TicketFlow>,
    scans: Arc<ScanSlot>,
    restart: Arc<RestartSignal>,
    tasks: Vec<TaskRef>,
    alive: AliveSet,
}

impl Device {
    pub fn builder(cfg: Config) -> DeviceBuilder {
        DeviceBuilder {
            cfg,
            api: None,
            link: None,
            session: None,
            display: None,
            store: None,
            subscribers: Vec::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn busy_lock(&self) -> &BusyLock {
        &self.lock
    }

    pub fn connectivity(&self) -> &Arc<Connectivity> {
        &self.connectivity
    }

    /// Entry points for externally triggered operations (new customer, ...).
    pub fn handlers(&self) -> &Arc<Handlers> {
        &self.handlers
    }

    pub fn flow(&self) -> &Arc<TicketFlow> {
        &self.flow
    }

    /// Slot fed by the ticket scanner.
    pub fn scans(&self) -> &Arc<ScanSlot> {
        &self.scans
    }

    pub fn restart_signal(&self) -> &Arc<RestartSignal> {
        &self.restart
    }

    /// Runs until shutdown, restart request, or every task has exited.
    pub async fn run(&self) -> Result<(), RuntimeError> {
        let token = CancellationToken::new();
        self.subscriber_listener();

        let mut set = JoinSet::new();
        for task in &self.tasks {
            self.spawn_task(&mut set, Arc::clone(task), token.child_token(), token.clone());
        }
        self.spawn_bootstrap(&mut set, token.child_token());

        self.drive_shutdown(&mut set, &token).await
    }

    /// Forwards bus events to the subscriber set (fire-and-forget).
    fn subscriber_listener(&self) {
        let mut rx = self.bus.subscribe();
        let set = Arc::clone(&self.subs);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => set.emit(&ev),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "event listener lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    fn spawn_task(
        &self,
        set: &mut JoinSet<()>,
        task: TaskRef,
        ctx: CancellationToken,
        runtime: CancellationToken,
    ) {
        let bus = self.bus.clone();
        let entry = self.alive.enter(task.name());
        set.spawn(async move {
            let _entry = entry;
            let name = task.name().to_string();
            bus.publish(Event::new(EventKind::TaskStarting).with_task(name.as_str()));
            match run_guarded(&task, ctx).await {
                Ok(()) | Err(TaskError::Canceled) => {
                    bus.publish(Event::new(EventKind::TaskStopped).with_task(name));
                }
                Err(e @ TaskError::Fatal { .. }) => {
                    bus.publish(
                        Event::new(EventKind::TaskFailed)
                            .with_task(name)
                            .with_reason(e.to_string()),
                    );
                    runtime.cancel();
                }
                Err(e) => {
                    bus.publish(
                        Event::new(EventKind::TaskFailed)
                            .with_task(name)
                            .with_reason(e.to_string()),
                    );
                }
            }
        });
    }

    fn spawn_bootstrap(&self, set: &mut JoinSet<()>, ctx: CancellationToken) {
        let handlers = Arc::clone(&self.handlers);
        let entry = self.alive.enter("catalog-bootstrap");
        set.spawn(async move {
            let _entry = entry;
            handlers.bootstrap_catalog(&ctx).await;
        });
    }

    async fn drive_shutdown(
        &self,
        set: &mut JoinSet<()>,
        token: &CancellationToken,
    ) -> Result<(), RuntimeError> {
        tokio::select! {
            _ = shutdown::shutdown_requested() => {
                self.bus.publish(Event::new(EventKind::ShutdownRequested));
                token.cancel();
                self.wait_all_with_grace(set).await
            }
            _ = self.restart.requested() => {
                token.cancel();
                // grace overrun is reported as an event; the restart wins
                let _ = self.wait_all_with_grace(set).await;
                Err(RuntimeError::RestartRequested {
                    reason: self.restart.reason().unwrap_or_default(),
                })
            }
            _ = token.cancelled() => self.wait_all_with_grace(set).await,
            _ = async { while set.join_next().await.is_some() {} } => Ok(()),
        }
    }

    async fn wait_all_with_grace(&self, set: &mut JoinSet<()>) -> Result<(), RuntimeError> {
        let grace = self.cfg.grace;
        let done = async { while set.join_next().await.is_some() {} };

        match tokio::time::timeout(grace, done).await {
            Ok(()) => {
                self.bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_) => {
                self.bus.publish(Event::new(EventKind::GraceExceeded));
                let stuck = self.alive.snapshot();
                set.abort_all();
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }
}
