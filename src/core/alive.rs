//! Names of the tasks that are still running.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;

/// Set of running task names. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub(crate) struct AliveSet {
    names: Arc<Mutex<BTreeSet<String>>>,
}

impl AliveSet {
    /// Marks `name` running until the returned entry is dropped.
    pub(crate) fn enter(&self, name: &str) -> AliveEntry {
        self.names.lock().insert(name.to_string());
        AliveEntry {
            names: Arc::clone(&self.names),
            name: name.to_string(),
        }
    }

    pub(crate) fn snapshot(&self) -> Vec<String> {
        self.names.lock().iter().cloned().collect()
    }
}

/// Removes its name on drop, including when the task panics.
pub(crate) struct AliveEntry {
    names: Arc<Mutex<BTreeSet<String>>>,
    name: String,
}

impl Drop for AliveEntry {
    fn drop(&mut self) {
        self.names.lock().remove(&self.name);
    }
}
