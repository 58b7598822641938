use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::Connectivity;
use crate::config::Config;
use crate::error::TaskError;
use crate::handlers::Handlers;
use crate::ports::InboundMessage;
use crate::tasks::Task;

/// Ticks [`Connectivity`] every `connectivity_tick` and dispatches inbound
/// messages. A message on the control topic spawns a catalog refresh; other
/// topics are ignored.
pub struct ConnectivityLoop {
    connectivity: Arc<Connectivity>,
    handlers: Arc<Handlers>,
    tick: Duration,
}

impl ConnectivityLoop {
    pub fn new(cfg: &Config, connectivity: Arc<Connectivity>, handlers: Arc<Handlers>) -> Self {
        Self {
            connectivity,
            handlers,
            tick: cfg.connectivity_tick,
        }
    }

    /// Routes one inbound message; returns whether it was acted upon.
    pub fn dispatch(&self, msg: &InboundMessage) -> bool {
        if msg.topic != self.connectivity.control_topic() {
            tracing::debug!(topic = %msg.topic, "inbound message ignored");
            return false;
        }
        // fire-and-forget; the handler reports its own failures
        drop(self.handlers.spawn_refresh_catalog());
        true
    }
}

#[async_trait]
impl Task for ConnectivityLoop {
    fn name(&self) -> &str {
        "connectivity"
    }

    async fn run(&self, ctx: CancellationToken) -> Result<(), TaskError> {
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ctx.cancelled() => return Ok(()),
                now = ticker.tick() => {
                    for msg in self.connectivity.tick(now).await {
                        self.dispatch(&msg);
                    }
                }
            }
        }
    }
}
