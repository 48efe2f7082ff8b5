//! Cache storage.
//!
//! [`CacheStore`] and [`CacheRegion`] are the narrow interface the
//! orchestrator talks to. [`InMemoryStore`] is the bundled backend: one LRU
//! region per entity type.

use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use lru::LruCache;
use metrics::counter;
use tracing::debug;

use crate::domain::types::{EntityType, Value};

use super::config::StoreConfig;
use super::keys::CacheKey;
use super::lock::{rw_read, rw_write};

const METRIC_REGION_HIT: &str = "domaincache_region_hit_total";
const METRIC_REGION_MISS: &str = "domaincache_region_miss_total";
const METRIC_REGION_PUT: &str = "domaincache_region_put_total";
const METRIC_REGION_EVICT: &str = "domaincache_region_evict_total";
const METRIC_REGION_CLEAR: &str = "domaincache_region_clear_total";

/// One logical cache, named after the entity type it holds.
pub trait CacheRegion: Send + Sync {
    fn name(&self) -> &EntityType;
    fn get(&self, key: &CacheKey) -> Option<Value>;
    fn put(&self, key: CacheKey, value: Value);
    fn evict(&self, key: &CacheKey);
    fn clear(&self);
}

/// Resolves the region backing an entity type.
pub trait CacheStore: Send + Sync {
    /// `None` when no region is configured for `entity_type`.
    fn region(&self, entity_type: &EntityType) -> Option<Arc<dyn CacheRegion>>;
}

/// Bounded in-memory region with LRU replacement.
pub struct LruRegion {
    name: EntityType,
    entries: RwLock<LruCache<CacheKey, Value>>,
}

impl LruRegion {
    pub fn new(name: EntityType, config: &StoreConfig) -> Self {
        Self {
            name,
            entries: RwLock::new(LruCache::new(config.region_capacity_non_zero())),
        }
    }

    /// Get the number of cached entries.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, self.name.as_str(), "len").len()
    }

    /// Check if the region is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Presence check that leaves the recency order untouched.
    pub fn contains(&self, key: &CacheKey) -> bool {
        rw_read(&self.entries, self.name.as_str(), "contains").contains(key)
    }
}

impl CacheRegion for LruRegion {
    fn name(&self) -> &EntityType {
        &self.name
    }

    fn get(&self, key: &CacheKey) -> Option<Value> {
        let found = rw_write(&self.entries, self.name.as_str(), "get")
            .get(key)
            .cloned();
        let metric = if found.is_some() {
            METRIC_REGION_HIT
        } else {
            METRIC_REGION_MISS
        };
        counter!(metric, "region" => self.name.to_string()).increment(1);
        found
    }

    fn put(&self, key: CacheKey, value: Value) {
        let displaced = rw_write(&self.entries, self.name.as_str(), "put").push(key.clone(), value);
        counter!(METRIC_REGION_PUT, "region" => self.name.to_string()).increment(1);

        if let Some((evicted, _)) = displaced
            && evicted != key
        {
            counter!(METRIC_REGION_EVICT, "region" => self.name.to_string()).increment(1);
            debug!(region = %self.name, key = %evicted, "Region at capacity; evicted LRU entry");
        }
    }

    fn evict(&self, key: &CacheKey) {
        rw_write(&self.entries, self.name.as_str(), "evict").pop(key);
    }

    fn clear(&self) {
        rw_write(&self.entries, self.name.as_str(), "clear").clear();
        counter!(METRIC_REGION_CLEAR, "region" => self.name.to_string()).increment(1);
    }
}

/// In-memory [`CacheStore`] keeping one [`LruRegion`] per entity type.
pub struct InMemoryStore {
    config: StoreConfig,
    regions: DashMap<EntityType, Arc<LruRegion>>,
}

impl InMemoryStore {
    /// Create a store, pre-creating the configured regions.
    pub fn new(config: StoreConfig) -> Self {
        let regions = DashMap::new();
        for name in &config.regions {
            regions.insert(name.clone(), Arc::new(LruRegion::new(name.clone(), &config)));
        }
        Self { config, regions }
    }

    /// Concrete region handle, creating it when the store allows it.
    pub fn lru_region(&self, entity_type: &EntityType) -> Option<Arc<LruRegion>> {
        if let Some(region) = self.regions.get(entity_type) {
            return Some(Arc::clone(region.value()));
        }
        if !self.config.create_missing_regions {
            return None;
        }

        let region = self
            .regions
            .entry(entity_type.clone())
            .or_insert_with(|| {
                debug!(region = %entity_type, "Creating cache region");
                Arc::new(LruRegion::new(entity_type.clone(), &self.config))
            });
        Some(Arc::clone(region.value()))
    }

    /// Names of all existing regions, sorted.
    pub fn region_names(&self) -> Vec<EntityType> {
        let mut names: Vec<EntityType> = self.regions.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    /// Clear every region.
    pub fn clear_all(&self) {
        for entry in self.regions.iter() {
            entry.value().clear();
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl CacheStore for InMemoryStore {
    fn region(&self, entity_type: &EntityType) -> Option<Arc<dyn CacheRegion>> {
        self.lru_region(entity_type)
            .map(|region| region as Arc<dyn CacheRegion>)
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use serde_json::json;

    use super::*;

    fn order(id: u64) -> Value {
        Value::entity("Order", json!({ "id": id }))
    }

    #[test]
    fn region_roundtrip() {
        let store = InMemoryStore::default();
        let region = store.region(&EntityType::new("Order")).expect("lazy region");
        let key = CacheKey::new("getOrder_42");

        assert!(region.get(&key).is_none());
        region.put(key.clone(), order(42));
        assert_eq!(region.get(&key), Some(order(42)));

        region.evict(&key);
        assert!(region.get(&key).is_none());
    }

    #[test]
    fn clear_empties_region() {
        let store = InMemoryStore::default();
        let region = store.lru_region(&EntityType::new("Order")).expect("region");
        region.put(CacheKey::new("a"), order(1));
        region.put(CacheKey::new("b"), order(2));
        assert_eq!(region.len(), 2);

        region.clear();
        assert!(region.is_empty());
    }

    #[test]
    fn fixed_store_does_not_create_regions() {
        let store = InMemoryStore::new(StoreConfig::fixed(["Invoice"]));
        assert!(store.region(&EntityType::new("Invoice")).is_some());
        assert!(store.region(&EntityType::new("Order")).is_none());
        assert_eq!(store.region_names(), vec![EntityType::new("Invoice")]);
    }

    #[test]
    fn lazy_regions_are_shared() {
        let store = InMemoryStore::default();
        let first = store.lru_region(&EntityType::new("Order")).expect("region");
        let second = store.lru_region(&EntityType::new("Order")).expect("region");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn lru_eviction_at_capacity() {
        let store = InMemoryStore::new(StoreConfig {
            region_capacity: 2,
            ..Default::default()
        });
        let region = store.lru_region(&EntityType::new("Order")).expect("region");

        region.put(CacheKey::new("1"), order(1));
        region.put(CacheKey::new("2"), order(2));
        assert!(region.get(&CacheKey::new("1")).is_some());

        // "2" is now least recently used.
        region.put(CacheKey::new("3"), order(3));
        assert!(region.contains(&CacheKey::new("1")));
        assert!(!region.contains(&CacheKey::new("2")));
        assert!(region.contains(&CacheKey::new("3")));
    }

    #[test]
    fn clear_all_touches_every_region() {
        let store = InMemoryStore::default();
        for name in ["Invoice", "Customer"] {
            let region = store.lru_region(&EntityType::new(name)).expect("region");
            region.put(CacheKey::new("k"), Value::scalar(1));
        }

        store.clear_all();
        for name in store.region_names() {
            assert!(store.lru_region(&name).expect("region").is_empty());
        }
    }

    #[test]
    fn region_recovers_from_poisoned_lock() {
        let store = InMemoryStore::default();
        let region = store.lru_region(&EntityType::new("Order")).expect("region");

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = region
                .entries
                .write()
                .expect("region lock should be acquired");
            panic!("poison region lock");
        }));

        region.put(CacheKey::new("k"), order(1));
        assert!(region.get(&CacheKey::new("k")).is_some());
    }
}
