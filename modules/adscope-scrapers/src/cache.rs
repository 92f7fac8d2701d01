// Process-local response cache for the SerpAPI client. Explicit struct with
// a lifetime bound to the owning scraper; nothing module-global.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

pub struct TtlCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, Vec<serde_json::Value>)>>,
}

impl TtlCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<Vec<serde_json::Value>> {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        match entries.get(key) {
            Some((at, data)) if at.elapsed() < self.ttl => Some(data.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: &str, data: Vec<serde_json::Value>) {
        self.entries
            .lock()
            .expect("cache lock poisoned")
            .insert(key.to_string(), (Instant::now(), data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_within_ttl_miss_after() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("k", vec![serde_json::json!({"a": 1})]);
        assert_eq!(cache.get("k").unwrap().len(), 1);

        let expired = TtlCache::new(Duration::ZERO);
        expired.insert("k", vec![serde_json::json!({"a": 1})]);
        assert!(expired.get("k").is_none());
        // The stale entry is evicted, not retained.
        assert!(expired.entries.lock().unwrap().is_empty());
    }

    #[test]
    fn unknown_key_misses() {
        let cache = TtlCache::new(DEFAULT_TTL);
        assert!(cache.get("nope").is_none());
    }
}
