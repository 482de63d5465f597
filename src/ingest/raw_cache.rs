// src/ingest/raw_cache.rs
//! Per-source cache of the last successful fetch. One entry per source id,
//! overwritten on every success, never deleted: a stale entry is invisible to
//! the freshness check but stays around as the last-known-good fallback.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use crate::ingest::types::TrendItem;

#[derive(Debug, Clone)]
pub struct RawCacheEntry {
    pub items: Vec<TrendItem>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct RawCache {
    ttl: Duration,
    inner: Mutex<HashMap<String, RawCacheEntry>>,
}

impl RawCache {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl: Duration::seconds(ttl_secs as i64),
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub fn put(&self, source_id: &str, items: Vec<TrendItem>) {
        let entry = RawCacheEntry {
            items,
            fetched_at: Utc::now(),
        };
        let mut map = self.inner.lock().expect("raw cache mutex poisoned");
        map.insert(source_id.to_string(), entry);
    }

    /// Last successful fetch regardless of age.
    pub fn get(&self, source_id: &str) -> Option<RawCacheEntry> {
        let map = self.inner.lock().expect("raw cache mutex poisoned");
        map.get(source_id).cloned()
    }

    /// Entry only if it is still within its TTL at `now`; a stale entry is
    /// classified as absent here.
    pub fn get_fresh(&self, source_id: &str, now: DateTime<Utc>) -> Option<RawCacheEntry> {
        let map = self.inner.lock().expect("raw cache mutex poisoned");
        map.get(source_id)
            .filter(|e| now.signed_duration_since(e.fetched_at) < self.ttl)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str) -> TrendItem {
        TrendItem {
            rank: 1,
            title: title.into(),
            link: None,
            source_id: "s1".into(),
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn fresh_entry_is_returned_within_ttl() {
        let cache = RawCache::new(600);
        cache.put("s1", vec![item("a")]);
        let now = Utc::now();
        assert!(cache.get_fresh("s1", now).is_some());
        assert!(cache.get_fresh("s2", now).is_none());
    }

    #[test]
    fn stale_entry_is_invisible_to_freshness_but_kept_as_fallback() {
        let cache = RawCache::new(600);
        cache.put("s1", vec![item("a")]);
        let later = Utc::now() + Duration::seconds(601);
        assert!(cache.get_fresh("s1", later).is_none());
        // still available as last-known-good
        let lkg = cache.get("s1").expect("fallback entry");
        assert_eq!(lkg.items.len(), 1);
    }

    #[test]
    fn put_overwrites_previous_entry() {
        let cache = RawCache::new(600);
        cache.put("s1", vec![item("a")]);
        cache.put("s1", vec![item("b"), item("c")]);
        let entry = cache.get("s1").unwrap();
        assert_eq!(entry.items.len(), 2);
        assert_eq!(entry.items[0].title, "b");
    }
}
