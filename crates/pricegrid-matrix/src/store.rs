//! Process-wide price cache shared by every session.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use crate::keys::{DatePairKey, PriceEntry, RouteKey};

/// Cached results for one route.
pub type PriceMap = HashMap<DatePairKey, PriceEntry>;

/// Route-partitioned price cache.
///
/// Cloning is cheap and clones share the same storage, so a store created at
/// startup can be handed to every controller and session. Each operation
/// takes the lock once; nothing holds it across an await point. Entries are
/// only ever added or overwritten through [`merge`](Self::merge), never
/// removed, so a lagging session can fail to add results but never erase
/// another session's.
#[derive(Debug, Clone, Default)]
pub struct PriceCacheStore {
    inner: Arc<RwLock<HashMap<RouteKey, PriceMap>>>,
}

impl PriceCacheStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a route's prices; empty if the route was never seen.
    pub fn get(&self, route: &RouteKey) -> PriceMap {
        self.inner.read().get(route).cloned().unwrap_or_default()
    }

    /// Look up a single entry.
    pub fn entry(&self, route: &RouteKey, key: &DatePairKey) -> Option<PriceEntry> {
        self.inner
            .read()
            .get(route)
            .and_then(|prices| prices.get(key).copied())
    }

    /// Insert or overwrite one entry. Last write wins.
    pub fn merge(&self, route: &RouteKey, key: DatePairKey, entry: PriceEntry) {
        let mut inner = self.inner.write();
        let prices = inner.entry(route.clone()).or_default();
        let previous = prices.insert(key, entry);
        trace!(
            route = %route,
            pair = %key,
            entry = %entry,
            overwrote = previous.is_some(),
            "Merged price entry"
        );
    }

    /// Whether a result (price or absent) is cached for the pair.
    pub fn has(&self, route: &RouteKey, key: &DatePairKey) -> bool {
        self.inner
            .read()
            .get(route)
            .is_some_and(|prices| prices.contains_key(key))
    }

    /// The subset of `pairs` with no cached result, computed under one lock.
    pub fn missing(&self, route: &RouteKey, pairs: &[DatePairKey]) -> HashSet<DatePairKey> {
        let inner = self.inner.read();
        match inner.get(route) {
            Some(prices) => pairs
                .iter()
                .filter(|key| !prices.contains_key(key))
                .copied()
                .collect(),
            None => pairs.iter().copied().collect(),
        }
    }

    /// Number of cached entries for a route.
    pub fn len(&self, route: &RouteKey) -> usize {
        self.inner.read().get(route).map_or(0, HashMap::len)
    }

    /// Whether nothing at all is cached.
    pub fn is_empty(&self) -> bool {
        self.inner.read().values().all(HashMap::is_empty)
    }

    /// Routes with at least one cached entry.
    pub fn routes(&self) -> Vec<RouteKey> {
        let mut routes: Vec<RouteKey> = self
            .inner
            .read()
            .iter()
            .filter(|(_, prices)| !prices.is_empty())
            .map(|(route, _)| route.clone())
            .collect();
        routes.sort();
        routes
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.read();
        let mut stats = CacheStats {
            routes: inner.len(),
            ..CacheStats::default()
        };
        for entry in inner.values().flat_map(HashMap::values) {
            match entry {
                PriceEntry::Price(_) => stats.priced += 1,
                PriceEntry::Absent => stats.absent += 1,
            }
        }
        stats
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Routes with a partition.
    pub routes: usize,
    /// Entries holding a price.
    pub priced: usize,
    /// Entries holding the absent sentinel.
    pub absent: usize,
}

impl CacheStats {
    /// Total cached entries.
    pub fn entries(&self) -> usize {
        self.priced + self.absent
    }
}
