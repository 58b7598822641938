//! Busy lock and its deadlock watchdog.
//!
//! - [`BusyLock`] / [`BusyGuard`]: scoped exclusive access with an acquisition timestamp;
//! - [`DeadlockMonitor`]: restarts the device when the lock is held past a ceiling.
//!
//! The monitor only observes the lock; it never releases it.

mod lock;
mod monitor;

pub use lock::{BusyGuard, BusyLock};
pub use monitor::{DeadlockMonitor, DEADLOCK_DIAGNOSTIC};
