//! # OutboundWorker: single delivery loop over the outbound queue.
//!
//! Every `publish_interval`, while the bus session is connected:
//! 1. dequeue one message and publish it; a failed publish is logged and the
//!    message discarded (the connection, not the message, is retried);
//! 2. every `sample_interval`, feed the queue depth to the [`OverflowGuard`] and
//!    evict the oldest half when it reports sustained overload.
//!
//! While disconnected nothing is dequeued; messages accumulate up to capacity.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::OutboundQueue;
use crate::config::Config;
use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};
use crate::ports::MessageBus;
use crate::tasks::Task;

/// Overload detector fed with periodic depth samples.
///
/// A sample strictly above `threshold` is overloaded; `required` consecutive
/// overloaded samples ask for eviction of half the sampled depth and reset the
/// streak. Any sample at or below the threshold also resets it.
#[derive(Debug, Clone)]
pub struct OverflowGuard {
    threshold: usize,
    required: u32,
    streak: u32,
}

impl OverflowGuard {
    pub fn new(threshold: usize, required: u32) -> Self {
        Self {
            threshold,
            required: required.max(1),
            streak: 0,
        }
    }

    /// Records one depth sample; returns how many oldest messages to evict.
    pub fn sample(&mut self, depth: usize) -> Option<usize> {
        if depth <= self.threshold {
            self.streak = 0;
            return None;
        }
        self.streak += 1;
        if self.streak < self.required {
            return None;
        }
        self.streak = 0;
        Some(depth / 2)
    }

    /// Current run of consecutive overloaded samples.
    pub fn streak(&self) -> u32 {
        self.streak
    }
}

#[derive(Debug)]
struct WorkerState {
    guard: OverflowGuard,
    last_sample: Instant,
}

/// Drains the [`OutboundQueue`] to the [`MessageBus`].
pub struct OutboundWorker {
    queue: Arc<OutboundQueue>,
    session: Arc<dyn MessageBus>,
    bus: Bus,
    publish_interval: Duration,
    sample_interval: Duration,
    state: Mutex<WorkerState>,
}

impl OutboundWorker {
    pub fn new(cfg: &Config, queue: Arc<OutboundQueue>, session: Arc<dyn MessageBus>, bus: Bus) -> Self {
        Self {
            queue,
            session,
            bus,
            publish_interval: cfg.publish_interval,
            sample_interval: cfg.overflow_sample_interval,
            state: Mutex::new(WorkerState {
                guard: OverflowGuard::new(cfg.overflow_threshold(), cfg.overflow_samples),
                last_sample: Instant::now(),
            }),
        }
    }

    /// One worker iteration at `now`.
    pub async fn tick(&self, now: Instant) {
        if !self.session.is_connected() {
            return;
        }

        if let Some(msg) = self.queue.dequeue() {
            if let Err(e) = self.session.publish(&msg).await {
                let reason = if self.session.is_connected() {
                    format!("publish rejected: {} ({e})", msg.topic())
                } else {
                    format!("disconnected during publish: {}", msg.topic())
                };
                self.bus
                    .publish(Event::new(EventKind::PublishFailed).with_reason(reason));
            }
        }

        self.sample(now);
    }

    fn sample(&self, now: Instant) {
        let evict = {
            let mut st = self.state.lock();
            if now.saturating_duration_since(st.last_sample) < self.sample_interval {
                return;
            }
            st.last_sample = now;
            st.guard.sample(self.queue.len())
        };

        if let Some(n) = evict {
            let evicted = self.queue.evict_oldest(n);
            self.bus
                .publish(Event::new(EventKind::OutboundEvicted).with_count(evicted as u64));
        }
    }
}

#[async_trait]
impl Task for OutboundWorker {
    fn name(&self) -> &str {
        "outbound-worker"
    }

    async fn run(&self, ctx: CancellationToken) -> Result<(), TaskError> {
        let mut ticker = tokio::time::interval(self.publish_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ctx.cancelled() => return Ok(()),
                now = ticker.tick() => self.tick(now).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_evicts_on_third_consecutive_overload() {
        let mut g = OverflowGuard::new(40, 3);
        assert_eq!(g.sample(45), None);
        assert_eq!(g.sample(46), None);
        assert_eq!(g.sample(48), Some(24));
        assert_eq!(g.streak(), 0);
    }

    #[test]
    fn test_guard_streak_resets_on_healthy_sample() {
        let mut g = OverflowGuard::new(40, 3);
        g.sample(45);
        g.sample(45);
        assert_eq!(g.sample(40), None);
        assert_eq!(g.streak(), 0);
        assert_eq!(g.sample(45), None);
        assert_eq!(g.sample(45), None);
        assert_eq!(g.sample(45), Some(22));
    }
}
