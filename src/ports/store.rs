use std::collections::HashMap;

use parking_lot::Mutex;

use super::PortError;

/// Durable integer key-value store (e.g. NVS preferences).
pub trait KeyValueStore: Send + Sync + 'static {
    /// Reads `key`; `None` when absent.
    fn get_i64(&self, key: &str) -> Option<i64>;

    /// Writes `key`.
    fn put_i64(&self, key: &str, value: i64) -> Result<(), PortError>;
}

/// In-memory [`KeyValueStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, i64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_i64(&self, key: &str) -> Option<i64> {
        self.values.lock().get(key).copied()
    }

    fn put_i64(&self, key: &str, value: i64) -> Result<(), PortError> {
        self.values.lock().insert(key.to_string(), value);
        Ok(())
    }
}
