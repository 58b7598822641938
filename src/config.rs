//! # Device configuration.
//!
//! [`Config`] centralises every identity value and tunable of the device.
//! Every cadence of the device is a field here rather than
//! a constant baked into the loops.
//!
//! Config is used in two ways:
//! 1. **Defaults**: `Config::default()` holds the shipped device values.
//! 2. **Layered loading**: [`Config::load`] merges an optional TOML file and
//!    `TICKETVISOR_*` environment variables on top of the defaults.
//!
//! Durations are written in milliseconds in files and the environment
//! (`busy_timeout_ms = 3000`), and exposed as [`Duration`] in code.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Environment variable prefix for [`Config::load`].
pub const ENV_PREFIX: &str = "TICKETVISOR";

/// Global configuration for the device runtime.
///
/// ## Field groups
/// - **Identity**: `device_id`, `api_base_url`, `api_token`
/// - **Busy lock**: `busy_timeout`, `deadlock_ceiling`, `deadlock_check_interval`
/// - **Outbound queue**: `queue_capacity`, `queue_lock_timeout`, `publish_interval`,
///   `overflow_sample_interval`, `overflow_ratio`, `overflow_samples`
/// - **Connectivity**: `connectivity_tick`, `link_retry_interval`, `broker_retry_interval`
/// - **Remote calls**: `http_timeout`, `init_http_timeout`, `http_retries`,
///   `http_retry_delay`, `init_retry_delay`
/// - **Ticket flow**: `catalog_capacity`, `recheck_interval`, `idle_sleep`,
///   `scan_poll_interval`, `result_hold`
/// - **Runtime**: `grace`, `bus_capacity`
#[derive(Clone, Debug)]
pub struct Config {
    /// Device (bakery) identifier used in requests, topics and the broker client id.
    pub device_id: String,
    /// Base URL of the remote bakery service.
    pub api_base_url: String,
    /// Bearer token sent with every remote call.
    pub api_token: String,

    /// How long a caller waits for the busy lock before giving up.
    pub busy_timeout: Duration,
    /// Holding the busy lock longer than this triggers a device restart.
    ///
    /// A catalog fetch holds the lock for up to
    /// [`Config::catalog_fetch_worst_case`]. The shipped values (38.2s against
    /// 30s) overlap, so a fetch whose every attempt times out restarts the
    /// device; [`crate::Device`] logs a warning at build time when they do.
    pub deadlock_ceiling: Duration,
    /// Period of the deadlock monitor.
    pub deadlock_check_interval: Duration,

    /// Maximum number of pending outbound messages.
    pub queue_capacity: usize,
    /// Upper bound on entering the queue's critical section.
    pub queue_lock_timeout: Duration,
    /// Cadence of the outbound delivery worker.
    pub publish_interval: Duration,
    /// How often the worker samples queue depth for overload.
    pub overflow_sample_interval: Duration,
    /// Fraction of capacity above which a sample counts as overloaded.
    pub overflow_ratio: f64,
    /// Consecutive overloaded samples that trigger eviction of the oldest half.
    pub overflow_samples: u32,

    /// Cadence of the connectivity state machine.
    pub connectivity_tick: Duration,
    /// Minimum time between two link establishment attempts.
    pub link_retry_interval: Duration,
    /// Minimum time between two broker session attempts.
    pub broker_retry_interval: Duration,

    /// Timeout of a regular remote call.
    pub http_timeout: Duration,
    /// Timeout of a catalog fetch.
    pub init_http_timeout: Duration,
    /// Attempts of a catalog fetch before it is reported as failed.
    pub http_retries: u32,
    /// Fixed delay between two catalog fetch attempts.
    pub http_retry_delay: Duration,
    /// Delay between two bootstrap rounds while no catalog could be fetched.
    pub init_retry_delay: Duration,

    /// Maximum number of item kinds in the catalog and in a ticket.
    pub catalog_capacity: usize,
    /// With an empty queue, the current ticket is re-queried at least this often.
    pub recheck_interval: Duration,
    /// Sleep between two idle checks, and after a failed poll.
    pub idle_sleep: Duration,
    /// Cadence of the scan-or-timeout wait.
    pub scan_poll_interval: Duration,
    /// How long the advance result stays on the display.
    pub result_hold: Duration,

    /// Maximum wait for tasks to stop on shutdown.
    pub grace: Duration,
    /// Capacity of the internal event bus.
    pub bus_capacity: usize,
}

impl Config {
    /// Topic receiving diagnostic messages.
    pub fn errors_topic(&self) -> String {
        format!("bakery/{}/errors", self.device_id)
    }

    /// Inbound control topic; a message here triggers a catalog refresh.
    pub fn control_topic(&self) -> String {
        format!("bakery/{}/bread_time_update", self.device_id)
    }

    /// Queue depth above which a sample counts as overloaded.
    #[inline]
    pub fn overflow_threshold(&self) -> usize {
        (self.queue_capacity as f64 * self.overflow_ratio) as usize
    }

    /// Longest time one catalog fetch holds the busy lock: every attempt
    /// running into `init_http_timeout`, plus the delays between attempts.
    pub fn catalog_fetch_worst_case(&self) -> Duration {
        self.init_http_timeout * self.http_retries
            + self.http_retry_delay * self.http_retries.saturating_sub(1)
    }

    /// Loads the configuration from defaults, an optional TOML file and
    /// `TICKETVISOR_*` environment variables, in increasing precedence.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let raw: ConfigFile = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;
        raw.try_into()
    }

    /// Checks the invariants the components rely on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_id.is_empty() {
            return Err(invalid("device_id", "must not be empty"));
        }
        if self.queue_capacity == 0 {
            return Err(invalid("queue_capacity", "must be at least 1"));
        }
        if self.catalog_capacity == 0 {
            return Err(invalid("catalog_capacity", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.overflow_ratio) {
            return Err(invalid("overflow_ratio", "must be within 0.0..=1.0"));
        }
        if self.overflow_samples == 0 {
            return Err(invalid("overflow_samples", "must be at least 1"));
        }
        if self.http_retries == 0 {
            return Err(invalid("http_retries", "must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

impl Default for Config {
    /// Shipped device values:
    ///
    /// - busy lock: 3s timeout, 30s deadlock ceiling checked every 1s
    /// - outbound queue: 50 messages, 1s lock bound, 50ms delivery cadence,
    ///   overload = depth > 80% on 3 samples taken every 5s
    /// - connectivity: link retry 3.5s, broker retry 2.5s, tick 100ms
    /// - remote: 15s call timeout, 7s catalog timeout, 5 attempts 800ms apart,
    ///   bootstrap retry every 5s
    /// - flow: 10 item kinds, 5min re-check, 5s idle sleep, 1s scan cadence, 60s result hold
    fn default() -> Self {
        Self {
            device_id: "1".to_string(),
            api_base_url: "http://localhost:8000".to_string(),
            api_token: String::new(),

            busy_timeout: Duration::from_millis(3000),
            deadlock_ceiling: Duration::from_secs(30),
            deadlock_check_interval: Duration::from_secs(1),

            queue_capacity: 50,
            queue_lock_timeout: Duration::from_millis(1000),
            publish_interval: Duration::from_millis(50),
            overflow_sample_interval: Duration::from_secs(5),
            overflow_ratio: 0.8,
            overflow_samples: 3,

            connectivity_tick: Duration::from_millis(100),
            link_retry_interval: Duration::from_millis(3500),
            broker_retry_interval: Duration::from_millis(2500),

            http_timeout: Duration::from_secs(15),
            init_http_timeout: Duration::from_secs(7),
            http_retries: 5,
            http_retry_delay: Duration::from_millis(800),
            init_retry_delay: Duration::from_secs(5),

            catalog_capacity: 10,
            recheck_interval: Duration::from_secs(300),
            idle_sleep: Duration::from_secs(5),
            scan_poll_interval: Duration::from_secs(1),
            result_hold: Duration::from_secs(60),

            grace: Duration::from_secs(10),
            bus_capacity: 1024,
        }
    }
}

/// On-disk / environment schema: flat keys, durations in milliseconds.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct ConfigFile {
    device_id: String,
    api_base_url: String,
    api_token: String,
    busy_timeout_ms: u64,
    deadlock_ceiling_ms: u64,
    deadlock_check_interval_ms: u64,
    queue_capacity: usize,
    queue_lock_timeout_ms: u64,
    publish_interval_ms: u64,
    overflow_sample_interval_ms: u64,
    overflow_ratio: f64,
    overflow_samples: u32,
    connectivity_tick_ms: u64,
    link_retry_interval_ms: u64,
    broker_retry_interval_ms: u64,
    http_timeout_ms: u64,
    init_http_timeout_ms: u64,
    http_retries: u32,
    http_retry_delay_ms: u64,
    init_retry_delay_ms: u64,
    catalog_capacity: usize,
    recheck_interval_ms: u64,
    idle_sleep_ms: u64,
    scan_poll_interval_ms: u64,
    result_hold_ms: u64,
    grace_ms: u64,
    bus_capacity: usize,
}

impl Default for ConfigFile {
    fn default() -> Self {
        let c = Config::default();
        let ms = |d: Duration| d.as_millis() as u64;
        Self {
            device_id: c.device_id,
            api_base_url: c.api_base_url,
            api_token: c.api_token,
            busy_timeout_ms: ms(c.busy_timeout),
            deadlock_ceiling_ms: ms(c.deadlock_ceiling),
            deadlock_check_interval_ms: ms(c.deadlock_check_interval),
            queue_capacity: c.queue_capacity,
            queue_lock_timeout_ms: ms(c.queue_lock_timeout),
            publish_interval_ms: ms(c.publish_interval),
            overflow_sample_interval_ms: ms(c.overflow_sample_interval),
            overflow_ratio: c.overflow_ratio,
            overflow_samples: c.overflow_samples,
            connectivity_tick_ms: ms(c.connectivity_tick),
            link_retry_interval_ms: ms(c.link_retry_interval),
            broker_retry_interval_ms: ms(c.broker_retry_interval),
            http_timeout_ms: ms(c.http_timeout),
            init_http_timeout_ms: ms(c.init_http_timeout),
            http_retries: c.http_retries,
            http_retry_delay_ms: ms(c.http_retry_delay),
            init_retry_delay_ms: ms(c.init_retry_delay),
            catalog_capacity: c.catalog_capacity,
            recheck_interval_ms: ms(c.recheck_interval),
            idle_sleep_ms: ms(c.idle_sleep),
            scan_poll_interval_ms: ms(c.scan_poll_interval),
            result_hold_ms: ms(c.result_hold),
            grace_ms: ms(c.grace),
            bus_capacity: c.bus_capacity,
        }
    }
}

impl TryFrom<ConfigFile> for Config {
    type Error = ConfigError;

    fn try_from(f: ConfigFile) -> Result<Self, Self::Error> {
        let ms = Duration::from_millis;
        let cfg = Config {
            device_id: f.device_id,
            api_base_url: f.api_base_url,
            api_token: f.api_token,
            busy_timeout: ms(f.busy_timeout_ms),
            deadlock_ceiling: ms(f.deadlock_ceiling_ms),
            deadlock_check_interval: ms(f.deadlock_check_interval_ms),
            queue_capacity: f.queue_capacity,
            queue_lock_timeout: ms(f.queue_lock_timeout_ms),
            publish_interval: ms(f.publish_interval_ms),
            overflow_sample_interval: ms(f.overflow_sample_interval_ms),
            overflow_ratio: f.overflow_ratio,
            overflow_samples: f.overflow_samples,
            connectivity_tick: ms(f.connectivity_tick_ms),
            link_retry_interval: ms(f.link_retry_interval_ms),
            broker_retry_interval: ms(f.broker_retry_interval_ms),
            http_timeout: ms(f.http_timeout_ms),
            init_http_timeout: ms(f.init_http_timeout_ms),
            http_retries: f.http_retries,
            http_retry_delay: ms(f.http_retry_delay_ms),
            init_retry_delay: ms(f.init_retry_delay_ms),
            catalog_capacity: f.catalog_capacity,
            recheck_interval: ms(f.recheck_interval_ms),
            idle_sleep: ms(f.idle_sleep_ms),
            scan_poll_interval: ms(f.scan_poll_interval_ms),
            result_hold: ms(f.result_hold_ms),
            grace: ms(f.grace_ms),
            bus_capacity: f.bus_capacity,
        };
        cfg.validate()?;
        Ok(cfg)
    }
}
