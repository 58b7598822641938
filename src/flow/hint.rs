use std::sync::atomic::{AtomicBool, Ordering};

/// "A customer is probably queued" flag.
///
/// Written by ticket polls and new-customer submissions. It only shortens the
/// idle wait of the ticket flow and never gates a remote call.
#[derive(Debug, Default)]
pub struct QueueHint(AtomicBool);

impl QueueHint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, queued: bool) {
        self.0.store(queued, Ordering::Relaxed);
    }

    pub fn get(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
