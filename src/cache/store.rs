//! In-memory response store.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::Instant;

use super::traits::{CachePolicy, Freshness};

/// A stored response payload.
#[derive(Debug, Clone)]
pub struct CacheEntry {
  pub payload: Arc<Value>,
  /// Monotonic time of storage, used for freshness
  pub fetched_at: Instant,
  /// Wall-clock time of storage, used for display
  pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
  pub fn new(payload: Arc<Value>) -> Self {
    Self {
      payload,
      fetched_at: Instant::now(),
      stored_at: Utc::now(),
    }
  }

  pub fn freshness(&self, now: Instant, policy: &CachePolicy) -> Freshness {
    policy.classify(now.saturating_duration_since(self.fetched_at))
  }
}

/// Keyed payload store. Entries are replaced whole and never expire on
/// their own; expired entries stay around as fallback data.
#[derive(Debug, Default)]
pub struct ResponseStore {
  entries: HashMap<String, CacheEntry>,
}

impl ResponseStore {
  pub fn get(&self, key: &str) -> Option<&CacheEntry> {
    self.entries.get(key)
  }

  /// Store `payload` under `key`, overwriting any previous entry.
  pub fn insert(&mut self, key: String, payload: Arc<Value>) {
    self.entries.insert(key, CacheEntry::new(payload));
  }

  /// Remove every entry whose key contains `needle` anywhere.
  pub fn remove_matching(&mut self, needle: &str) -> usize {
    let before = self.entries.len();
    self.entries.retain(|key, _| !key.contains(needle));
    before - self.entries.len()
  }

  pub fn clear(&mut self) -> usize {
    let removed = self.entries.len();
    self.entries.clear();
    removed
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn keys(&self) -> impl Iterator<Item = &str> {
    self.entries.keys().map(String::as_str)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn remove_matching_uses_substring_containment() {
    let mut store = ResponseStore::default();
    store.insert("GET:/api/mufap/funds".into(), Arc::new(json!([])));
    store.insert("GET:/api/psx/stocks".into(), Arc::new(json!([])));
    store.insert(
      "GET:/api/psx/stocks/search?symbol=/api/mufap/".into(),
      Arc::new(json!([])),
    );

    assert_eq!(store.remove_matching("/api/mufap/"), 2);
    assert_eq!(store.keys().collect::<Vec<_>>(), vec!["GET:/api/psx/stocks"]);
  }

  #[test]
  fn insert_overwrites_existing_entry() {
    let mut store = ResponseStore::default();
    store.insert("GET:/a".into(), Arc::new(json!(1)));
    store.insert("GET:/a".into(), Arc::new(json!(2)));

    assert_eq!(store.len(), 1);
    assert_eq!(*store.get("GET:/a").unwrap().payload, json!(2));
  }
}
