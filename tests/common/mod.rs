#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use ticketvisor::{
    AdvanceOutcome, ApiError, BakeryApi, BusyLock, Bus, CatalogStore, Config, Connectivity,
    ConnectivityState, Display, HandlerDeps, Handlers, InboundMessage, ItemCatalog, ItemId, Link,
    MemoryStore, MessageBus, OutboundMessage, OutboundQueue, PortError, QueueHint, Quantities,
    Reporter, Restart, ScanSlot, SharedCatalog, StatusPanel, Ticket, TicketId,
};

/// Scriptable remote service with call recording.
#[derive(Default)]
pub struct FakeApi {
    pub catalog: Mutex<Vec<(ItemId, u32)>>,
    /// Number of upcoming catalog fetches that fail with a transport error.
    pub failing_fetches: AtomicU32,
    pub current: Mutex<Option<Ticket>>,
    pub fail_current: AtomicBool,
    pub fail_new_customer: AtomicBool,
    pub fail_skip: AtomicBool,
    /// How long a skip call takes.
    pub skip_delay: Mutex<Duration>,
    pub next_id: AtomicU32,
    pub advance_items: Mutex<Quantities>,

    pub fetch_calls: AtomicUsize,
    pub current_calls: AtomicUsize,
    pub new_customers: Mutex<Vec<Quantities>>,
    pub advanced: Mutex<Vec<TicketId>>,
    pub skipped: Mutex<Vec<TicketId>>,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_catalog(entries: &[(ItemId, u32)]) -> Arc<Self> {
        let api = Self::default();
        *api.catalog.lock() = entries.to_vec();
        Arc::new(api)
    }

    pub fn serve(&self, ticket: Ticket) {
        *self.current.lock() = Some(ticket);
    }

    pub fn fail_fetches(&self, n: u32) {
        self.failing_fetches.store(n, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn remote_calls(&self) -> usize {
        self.fetch_count()
            + self.current_calls.load(Ordering::SeqCst)
            + self.new_customers.lock().len()
            + self.advanced.lock().len()
            + self.skipped.lock().len()
    }
}

#[async_trait]
impl BakeryApi for FakeApi {
    async fn fetch_catalog(&self) -> Result<Vec<(ItemId, u32)>, ApiError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing_fetches.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_fetches.store(failing - 1, Ordering::SeqCst);
            return Err(ApiError::Transport("connection refused".into()));
        }
        Ok(self.catalog.lock().clone())
    }

    async fn new_customer(&self, quantities: &Quantities) -> Result<TicketId, ApiError> {
        self.new_customers.lock().push(quantities.clone());
        if self.fail_new_customer.load(Ordering::SeqCst) {
            return Err(ApiError::Status(500));
        }
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn advance_ticket(&self, ticket: TicketId) -> Result<AdvanceOutcome, ApiError> {
        self.advanced.lock().push(ticket);
        self.current.lock().take();
        Ok(AdvanceOutcome {
            current_ticket_id: Some(ticket + 1),
            skipped: false,
            items: self.advance_items.lock().clone(),
        })
    }

    async fn current_ticket(&self) -> Result<Option<Ticket>, ApiError> {
        self.current_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_current.load(Ordering::SeqCst) {
            return Err(ApiError::Status(502));
        }
        Ok(self.current.lock().clone())
    }

    async fn skip_ticket(&self, ticket: TicketId) -> Result<(), ApiError> {
        self.skipped.lock().push(ticket);
        let delay = *self.skip_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_skip.load(Ordering::SeqCst) {
            return Err(ApiError::Transport("timed out".into()));
        }
        self.current.lock().take();
        Ok(())
    }
}

/// Network link; `begin_connect` brings it up when `up_on_connect` is set.
#[derive(Default)]
pub struct FakeLink {
    pub up: AtomicBool,
    pub up_on_connect: AtomicBool,
    pub attempts: AtomicUsize,
}

impl FakeLink {
    pub fn new(up: bool) -> Arc<Self> {
        let link = Self::default();
        link.up.store(up, Ordering::SeqCst);
        Arc::new(link)
    }

    pub fn set_up(&self, up: bool) {
        self.up.store(up, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Link for FakeLink {
    fn is_up(&self) -> bool {
        self.up.load(Ordering::SeqCst)
    }

    async fn begin_connect(&self) {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.up_on_connect.load(Ordering::SeqCst) {
            self.up.store(true, Ordering::SeqCst);
        }
    }
}

/// Broker session with scriptable connect/publish outcomes.
pub struct FakeBus {
    pub connected: AtomicBool,
    pub accept_connect: AtomicBool,
    pub reject_publish: AtomicBool,
    pub connects: AtomicUsize,
    pub subscriptions: Mutex<Vec<String>>,
    pub inbound: Mutex<Vec<InboundMessage>>,
    pub published: Mutex<Vec<OutboundMessage>>,
}

impl FakeBus {
    pub fn new(accept_connect: bool) -> Arc<Self> {
        Arc::new(Self {
            connected: AtomicBool::new(false),
            accept_connect: AtomicBool::new(accept_connect),
            reject_publish: AtomicBool::new(false),
            connects: AtomicUsize::new(0),
            subscriptions: Mutex::new(Vec::new()),
            inbound: Mutex::new(Vec::new()),
            published: Mutex::new(Vec::new()),
        })
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn push_inbound(&self, topic: &str, payload: &str) {
        self.inbound.lock().push(InboundMessage {
            topic: topic.to_string(),
            payload: payload.to_string(),
        });
    }

    pub fn published_topics(&self) -> Vec<String> {
        self.published
            .lock()
            .iter()
            .map(|m| m.topic().to_string())
            .collect()
    }
}

#[async_trait]
impl MessageBus for FakeBus {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self, _client_id: &str) -> Result<(), PortError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.accept_connect.load(Ordering::SeqCst) {
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        } else {
            Err(PortError::new("broker unreachable"))
        }
    }

    async fn subscribe(&self, topic: &str) -> Result<(), PortError> {
        self.subscriptions.lock().push(topic.to_string());
        Ok(())
    }

    async fn poll(&self) -> Vec<InboundMessage> {
        std::mem::take(&mut *self.inbound.lock())
    }

    async fn publish(&self, message: &OutboundMessage) -> Result<(), PortError> {
        if self.reject_publish.load(Ordering::SeqCst) {
            return Err(PortError::new("rejected"));
        }
        self.published.lock().push(message.clone());
        Ok(())
    }
}

/// Display recording every render as a string.
#[derive(Default)]
pub struct RecordingDisplay {
    pub frames: Mutex<Vec<String>>,
}

impl RecordingDisplay {
    pub fn last(&self) -> Option<String> {
        self.frames.lock().last().cloned()
    }
}

impl Display for RecordingDisplay {
    fn show_digits(&self, d: [u8; 3]) {
        self.frames.lock().push(format!("{}{}{}", d[0], d[1], d[2]));
    }

    fn show_char(&self, c: char) {
        self.frames.lock().push(c.to_string());
    }
}

#[derive(Default)]
pub struct CountingRestart {
    pub count: AtomicUsize,
}

impl Restart for CountingRestart {
    fn restart(&self, _reason: &str) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Config with short waits where it keeps tests fast.
pub fn test_config() -> Config {
    Config {
        device_id: "42".to_string(),
        ..Config::default()
    }
}

/// Components wired the same way the device wires them.
pub struct Rig {
    pub cfg: Config,
    pub api: Arc<FakeApi>,
    pub link: Arc<FakeLink>,
    pub session: Arc<FakeBus>,
    pub display: Arc<RecordingDisplay>,
    pub store: Arc<MemoryStore>,
    pub bus: Bus,
    pub lock: BusyLock,
    pub queue: Arc<OutboundQueue>,
    pub panel: Arc<StatusPanel>,
    pub connectivity: Arc<Connectivity>,
    pub handlers: Arc<Handlers>,
    pub scans: Arc<ScanSlot>,
}

impl Rig {
    pub fn new(api: Arc<FakeApi>) -> Self {
        Self::with_config(test_config(), api)
    }

    pub fn with_config(cfg: Config, api: Arc<FakeApi>) -> Self {
        let link = FakeLink::new(false);
        let session = FakeBus::new(true);
        let display = Arc::new(RecordingDisplay::default());
        let store = Arc::new(MemoryStore::new());
        let bus = Bus::new(256);
        let lock = BusyLock::new();
        let queue = Arc::new(OutboundQueue::new(cfg.queue_capacity, cfg.queue_lock_timeout));
        let reporter = Reporter::new(Arc::clone(&queue), cfg.errors_topic(), bus.clone());
        let panel = Arc::new(StatusPanel::new(display.clone()));
        let connectivity = Arc::new(Connectivity::new(
            &cfg,
            link.clone(),
            session.clone(),
            Arc::clone(&panel),
            bus.clone(),
        ));
        let handlers = Arc::new(Handlers::new(
            &cfg,
            HandlerDeps {
                api: api.clone(),
                connectivity: Arc::clone(&connectivity),
                lock: lock.clone(),
                reporter,
                panel: Arc::clone(&panel),
                catalog: SharedCatalog::default(),
                store: CatalogStore::new(store.clone()),
                hint: Arc::new(QueueHint::new()),
                bus: bus.clone(),
            },
        ));

        Self {
            cfg,
            api,
            link,
            session,
            display,
            store,
            bus,
            lock,
            queue,
            panel,
            connectivity,
            handlers,
            scans: Arc::new(ScanSlot::new()),
        }
    }

    /// Brings link and broker up and ticks until `Ready`.
    pub async fn make_ready(&self) {
        self.link.set_up(true);
        for _ in 0..3 {
            self.connectivity.tick(Instant::now()).await;
            if self.connectivity.state() == ConnectivityState::Ready {
                return;
            }
        }
        panic!("connectivity did not become ready");
    }

    pub fn set_catalog(&self, entries: &[(ItemId, u32)]) {
        self.handlers
            .catalog()
            .replace(ItemCatalog::from_entries(entries.iter().copied(), 10));
    }

    /// Payloads queued on the errors topic, oldest first.
    pub fn diagnostics(&self) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(msg) = self.queue.dequeue() {
            out.push(msg.payload().to_string());
        }
        out
    }
}

pub const SHORT: Duration = Duration::from_millis(10);
