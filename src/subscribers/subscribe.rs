//! # Core subscriber trait
//!
//! Each subscriber is driven by a dedicated worker fed by a bounded queue owned
//! by the [`SubscriberSet`](crate::SubscriberSet). A slow subscriber delays
//! only itself; when its queue overflows, events for it are dropped.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use ticketvisor::{Event, EventKind, Subscribe};
//!
//! struct SkipCounter(std::sync::atomic::AtomicUsize);
//!
//! #[async_trait]
//! impl Subscribe for SkipCounter {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::TicketSkipped {
//!             self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
//!         }
//!     }
//!     fn name(&self) -> &'static str { "skip-counter" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Contract for event subscribers.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles a single event.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this subscriber's queue.
    fn queue_capacity(&self) -> usize {
        256
    }
}
