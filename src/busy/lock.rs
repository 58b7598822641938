//! # BusyLock: device-wide exclusive access with an acquisition timestamp.
//!
//! Guards the remote operations that must not interleave (catalog fetch,
//! new-customer submission, standalone next-ticket). Acquisition is scoped:
//! [`BusyLock::try_acquire`] returns a [`BusyGuard`] and dropping the guard is
//! the only way to release, so every exit path (early return, `?`, panic)
//! releases.
//!
//! ```text
//!   free ──try_acquire(ok)──► held(since) ──guard dropped──► free
//!     ▲                                                       │
//!     └───────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rules
//! - At most one holder at any instant (single-permit semaphore).
//! - `since` is set right after the permit is obtained and cleared right before
//!   it is returned, so a new holder's timestamp is never erased.
//! - Not re-entrant: a holder calling `try_acquire` again waits and times out
//!   like any other caller.
//! - Failing to acquire is not an error; it means "try again later".

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

#[derive(Debug)]
struct Inner {
    permit: Arc<Semaphore>,
    since: Mutex<Option<Instant>>,
}

/// Exclusive-access primitive shared by all tasks. Cheap to clone.
#[derive(Debug, Clone)]
pub struct BusyLock {
    inner: Arc<Inner>,
}

impl Default for BusyLock {
    fn default() -> Self {
        Self::new()
    }
}

impl BusyLock {
    /// Creates a free lock.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                permit: Arc::new(Semaphore::new(1)),
                since: Mutex::new(None),
            }),
        }
    }

    /// Waits up to `timeout` for exclusive ownership.
    pub async fn try_acquire(&self, timeout: Duration) -> Option<BusyGuard> {
        let acquire = Arc::clone(&self.inner.permit).acquire_owned();
        match tokio::time::timeout(timeout, acquire).await {
            Ok(Ok(permit)) => Some(self.guard(permit)),
            // The semaphore is never closed; a closed one reads as "busy".
            Ok(Err(_)) | Err(_) => None,
        }
    }

    /// Takes ownership only if the lock is free right now.
    pub fn try_acquire_now(&self) -> Option<BusyGuard> {
        Arc::clone(&self.inner.permit)
            .try_acquire_owned()
            .ok()
            .map(|permit| self.guard(permit))
    }

    fn guard(&self, permit: OwnedSemaphorePermit) -> BusyGuard {
        *self.inner.since.lock() = Some(Instant::now());
        BusyGuard {
            inner: Arc::clone(&self.inner),
            _permit: permit,
        }
    }

    /// Reports current ownership without blocking.
    pub fn is_held(&self) -> bool {
        self.inner.permit.available_permits() == 0
    }

    /// When the current holder acquired the lock, if it is held.
    pub fn held_since(&self) -> Option<Instant> {
        *self.inner.since.lock()
    }

    /// How long the current holder has held the lock at `now`.
    pub fn held_for(&self, now: Instant) -> Option<Duration> {
        self.held_since()
            .map(|since| now.saturating_duration_since(since))
    }
}

/// Proof of exclusive ownership; releases on drop.
#[must_use = "the busy lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct BusyGuard {
    inner: Arc<Inner>,
    // Dropped after `Drop::drop` has cleared `since`.
    _permit: OwnedSemaphorePermit,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        *self.inner.since.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_second_caller_times_out_while_held() {
        let lock = BusyLock::new();
        let guard = lock.try_acquire(Duration::from_secs(3)).await;
        assert!(guard.is_some());
        assert!(lock.is_held());

        let other = lock.clone();
        let second = other.try_acquire(Duration::from_secs(3)).await;
        assert!(second.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_attempts_yield_exactly_one_winner() {
        let lock = BusyLock::new();
        let (a, b) = tokio::join!(
            lock.try_acquire(Duration::from_millis(100)),
            lock.try_acquire(Duration::from_millis(100)),
        );
        assert_eq!(a.is_some() as u8 + b.is_some() as u8, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_released_lock_is_immediately_reacquirable_by_another_caller() {
        let lock = BusyLock::new();
        let guard = lock.try_acquire_now().unwrap();
        drop(guard);

        assert!(!lock.is_held());
        assert!(lock.held_since().is_none());

        let other = lock.clone();
        assert!(other.try_acquire_now().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiter_gets_lock_when_holder_releases_within_timeout() {
        let lock = BusyLock::new();
        let guard = lock.try_acquire_now().unwrap();

        let waiter = {
            let lock = lock.clone();
            tokio::spawn(async move { lock.try_acquire(Duration::from_secs(3)).await.is_some() })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        drop(guard);

        assert!(waiter.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_holder_cannot_reenter() {
        let lock = BusyLock::new();
        let _guard = lock.try_acquire_now().unwrap();
        assert!(lock.try_acquire(Duration::from_millis(50)).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timestamp_tracks_acquisition() {
        let lock = BusyLock::new();
        let start = Instant::now();
        let _guard = lock.try_acquire_now().unwrap();

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(lock.held_since(), Some(start));
        assert_eq!(lock.held_for(Instant::now()), Some(Duration::from_secs(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_on_error_path() {
        async fn failing(lock: &BusyLock) -> Result<(), &'static str> {
            let _guard = lock.try_acquire_now().ok_or("busy")?;
            Err("remote call failed")
        }

        let lock = BusyLock::new();
        assert!(failing(&lock).await.is_err());
        assert!(!lock.is_held());
    }
}
