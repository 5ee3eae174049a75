//! In-process store of warehouse results, keyed by query fingerprint.
//! Entries live until explicitly invalidated and are never mutated in place.

use dashmap::DashMap;
use insights_core::EventRecord;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct CacheEntry {
    records: Arc<[EventRecord]>,
    fetched_at: Instant,
}

/// Lock-free map of immutable query results.
#[derive(Default)]
pub struct QueryCache {
    store: DashMap<String, CacheEntry>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self {
            store: DashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<[EventRecord]>> {
        self.store.get(key).map(|e| Arc::clone(&e.records))
    }

    /// Store a result and hand back the shared copy.
    pub fn put(&self, key: String, records: Vec<EventRecord>) -> Arc<[EventRecord]> {
        let records: Arc<[EventRecord]> = records.into();
        self.store.insert(
            key,
            CacheEntry {
                records: Arc::clone(&records),
                fetched_at: Instant::now(),
            },
        );
        records
    }

    /// How long ago `key` was fetched.
    pub fn age(&self, key: &str) -> Option<Duration> {
        self.store.get(key).map(|e| e.fetched_at.elapsed())
    }

    /// Drop every entry. Returns how many were removed.
    pub fn invalidate(&self) -> usize {
        let before = self.store.len();
        self.store.clear();
        before
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn record(user: &str) -> EventRecord {
        EventRecord {
            event_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default(),
            event_time: NaiveTime::from_hms_opt(0, 0, 0).unwrap_or_default(),
            event_name: "first_visit".into(),
            raw_user_id: user.into(),
            utm_term: None,
            phrase: None,
            profile: Default::default(),
        }
    }

    #[test]
    fn test_put_and_get_share_the_same_allocation() {
        let cache = QueryCache::new();
        let stored = cache.put("q".into(), vec![record("u1")]);
        let fetched = cache.get("q");
        assert!(fetched.is_some_and(|f| Arc::ptr_eq(&f, &stored)));
        assert!(cache.age("q").is_some());
        assert!(cache.get("other").is_none());
    }

    #[test]
    fn test_invalidate_clears_everything() {
        let cache = QueryCache::new();
        cache.put("a".into(), vec![record("u1")]);
        cache.put("b".into(), vec![]);
        assert_eq!(cache.invalidate(), 2);
        assert!(cache.is_empty());
    }
}
