//! Warehouse access through the query cache: the first read fetches, later
//! reads share the cached result until it is invalidated.

use crate::local::QueryCache;
use insights_analytics::{EventQuery, EventWarehouse};
use insights_core::{EventRecord, InsightsResult};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub struct CachedWarehouse {
    warehouse: EventWarehouse,
    query: EventQuery,
    key: String,
    cache: Arc<QueryCache>,
    // Serializes misses so concurrent requests trigger a single fetch.
    fill: Mutex<()>,
}

impl CachedWarehouse {
    pub fn new(warehouse: EventWarehouse, query: EventQuery) -> Self {
        let key = query.fingerprint();
        Self {
            warehouse,
            query,
            key,
            cache: Arc::new(QueryCache::new()),
            fill: Mutex::new(()),
        }
    }

    /// Cached events, fetching them on the first call or after invalidation.
    /// A warehouse error is returned as-is and nothing is cached.
    pub async fn records(&self) -> InsightsResult<Arc<[EventRecord]>> {
        if let Some(records) = self.cache.get(&self.key) {
            metrics::counter!("cache.hit").increment(1);
            return Ok(records);
        }

        let _guard = self.fill.lock().await;
        if let Some(records) = self.cache.get(&self.key) {
            metrics::counter!("cache.hit").increment(1);
            return Ok(records);
        }
        metrics::counter!("cache.miss").increment(1);
        debug!(key = %self.key, backend = self.warehouse.backend_name(), "Cache miss, fetching events");

        let records = self.warehouse.fetch(&self.query).await?;
        Ok(self.cache.put(self.key.clone(), records))
    }

    /// Drop the cached result. Waits for an in-flight fetch so its result
    /// cannot land after the invalidation.
    pub async fn invalidate(&self) -> usize {
        let _guard = self.fill.lock().await;
        let removed = self.cache.invalidate();
        info!(removed = removed, "Event cache invalidated");
        removed
    }

    pub fn is_cached(&self) -> bool {
        self.cache.get(&self.key).is_some()
    }

    pub fn warehouse(&self) -> &EventWarehouse {
        &self.warehouse
    }
}
