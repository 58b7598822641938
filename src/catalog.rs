//! # Item catalog and its cold-start cache.
//!
//! [`ItemCatalog`] maps item id → per-unit cook time, ordered by id and
//! bounded to `capacity` kinds. It is always replaced wholesale.
//!
//! [`CatalogStore`] mirrors the catalog into a [`KeyValueStore`] so the device
//! can estimate cook times before its first successful fetch:
//!
//! ```text
//! cnt   number of entries
//! k{i}  item id of entry i
//! v{i}  cook seconds of entry i
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::ports::{KeyValueStore, PortError};
use crate::remote::{ItemId, Quantities};

/// Ordered item id → per-unit cook seconds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemCatalog {
    entries: BTreeMap<ItemId, u32>,
}

impl ItemCatalog {
    /// Builds a catalog keeping the first `capacity` entries in id order.
    pub fn from_entries<I>(entries: I, capacity: usize) -> Self
    where
        I: IntoIterator<Item = (ItemId, u32)>,
    {
        let all: BTreeMap<ItemId, u32> = entries.into_iter().collect();
        Self {
            entries: all.into_iter().take(capacity).collect(),
        }
    }

    /// Per-unit cook time of `item`.
    pub fn cook_time(&self, item: ItemId) -> Option<Duration> {
        self.entries
            .get(&item)
            .map(|secs| Duration::from_secs(u64::from(*secs)))
    }

    /// Σ quantity × cook time; items missing from the catalog contribute zero.
    pub fn estimate(&self, items: &Quantities) -> Duration {
        let secs = items.iter().fold(0u64, |acc, (item, qty)| {
            let unit = self.entries.get(item).copied().unwrap_or(0);
            acc.saturating_add(u64::from(*qty) * u64::from(unit))
        });
        Duration::from_secs(secs)
    }

    /// Item ids in catalog order.
    pub fn item_ids(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.entries.keys().copied()
    }

    /// Maps positional quantities onto catalog order; missing positions are 0.
    pub fn positional(&self, quantities: &[u32]) -> Quantities {
        self.item_ids()
            .enumerate()
            .map(|(i, item)| (item, quantities.get(i).copied().unwrap_or(0)))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ItemId, u32)> + '_ {
        self.entries.iter().map(|(k, v)| (*k, *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Catalog shared between the flow and the handlers.
#[derive(Debug, Clone, Default)]
pub struct SharedCatalog {
    inner: Arc<RwLock<ItemCatalog>>,
}

impl SharedCatalog {
    pub fn new(catalog: ItemCatalog) -> Self {
        Self {
            inner: Arc::new(RwLock::new(catalog)),
        }
    }

    /// Replaces the whole catalog.
    pub fn replace(&self, catalog: ItemCatalog) {
        *self.inner.write() = catalog;
    }

    /// Copy of the current catalog.
    pub fn snapshot(&self) -> ItemCatalog {
        self.inner.read().clone()
    }

    pub fn estimate(&self, items: &Quantities) -> Duration {
        self.inner.read().estimate(items)
    }

    pub fn positional(&self, quantities: &[u32]) -> Quantities {
        self.inner.read().positional(quantities)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

/// Persists an [`ItemCatalog`] in a [`KeyValueStore`].
#[derive(Clone)]
pub struct CatalogStore {
    store: Arc<dyn KeyValueStore>,
}

impl CatalogStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Writes every entry, then the count.
    pub fn save(&self, catalog: &ItemCatalog) -> Result<(), PortError> {
        for (i, (item, secs)) in catalog.iter().enumerate() {
            self.store.put_i64(&format!("k{i}"), i64::from(item))?;
            self.store.put_i64(&format!("v{i}"), i64::from(secs))?;
        }
        self.store.put_i64("cnt", catalog.len() as i64)
    }

    /// Reads the cached catalog; `None` when nothing usable is stored.
    ///
    /// Entries with a missing or out-of-range key or value are skipped.
    pub fn load(&self, capacity: usize) -> Option<ItemCatalog> {
        let count = self.store.get_i64("cnt")?;
        let count = usize::try_from(count).ok()?.min(capacity);
        let entries = (0..count).filter_map(|i| {
            let item = self.store.get_i64(&format!("k{i}"))?;
            let secs = self.store.get_i64(&format!("v{i}"))?;
            Some((ItemId::try_from(item).ok()?, u32::try_from(secs).ok()?))
        });
        let catalog = ItemCatalog::from_entries(entries, capacity);
        (!catalog.is_empty()).then_some(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::MemoryStore;

    fn catalog() -> ItemCatalog {
        ItemCatalog::from_entries([(1, 40), (2, 25)], 10)
    }

    #[test]
    fn test_estimate_sums_quantity_times_cook_time() {
        let items: Quantities = [(1, 3), (2, 2)].into_iter().collect();
        assert_eq!(catalog().estimate(&items), Duration::from_secs(170));
    }

    #[test]
    fn test_unknown_item_contributes_zero() {
        let items: Quantities = [(1, 1), (99, 5)].into_iter().collect();
        assert_eq!(catalog().estimate(&items), Duration::from_secs(40));
    }

    #[test]
    fn test_capacity_keeps_lowest_ids() {
        let c = ItemCatalog::from_entries([(5, 1), (3, 1), (9, 1), (1, 1)], 2);
        assert_eq!(c.item_ids().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_positional_quantities_follow_catalog_order() {
        let q = catalog().positional(&[4]);
        assert_eq!(q, [(1, 4), (2, 0)].into_iter().collect());
    }

    #[test]
    fn test_store_round_trip() {
        let kv = Arc::new(MemoryStore::new());
        let store = CatalogStore::new(kv.clone());
        store.save(&catalog()).unwrap();

        assert_eq!(kv.get_i64("cnt"), Some(2));
        assert_eq!(kv.get_i64("k1"), Some(2));
        assert_eq!(kv.get_i64("v1"), Some(25));
        assert_eq!(store.load(10), Some(catalog()));
    }

    #[test]
    fn test_empty_store_loads_nothing() {
        let store = CatalogStore::new(Arc::new(MemoryStore::new()));
        assert_eq!(store.load(10), None);
    }
}
