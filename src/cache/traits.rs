//! Core types shared by the response cache.

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Build the cache key for a request: `"{METHOD}:{path}"`.
///
/// The path includes its query string, so differently filtered lists are
/// cached independently.
pub fn cache_key(method: &Method, path: &str) -> String {
  format!("{}:{}", method.as_str(), path)
}

/// Split a cache key back into its method and path.
pub fn split_key(key: &str) -> Option<(Method, &str)> {
  let (method, path) = key.split_once(':')?;
  let method = Method::from_bytes(method.as_bytes()).ok()?;
  Some((method, path))
}

/// Age thresholds that decide how a cached entry may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
  /// Entries younger than this are served without any network activity
  pub fresh_ttl: Duration,
  /// Entries younger than this are served while a background refresh runs
  pub stale_ttl: Duration,
}

impl Default for CachePolicy {
  fn default() -> Self {
    Self {
      fresh_ttl: Duration::from_millis(120_000),
      stale_ttl: Duration::from_millis(600_000),
    }
  }
}

impl CachePolicy {
  pub fn classify(&self, age: Duration) -> Freshness {
    if age < self.fresh_ttl {
      Freshness::Fresh
    } else if age < self.stale_ttl {
      Freshness::Stale
    } else {
      Freshness::Expired
    }
  }
}

/// How usable a cached entry is, derived from its age.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
  Fresh,
  Stale,
  Expired,
}

/// Result of a cached request, including metadata about the source.
#[derive(Debug, Clone)]
pub struct CachedResponse {
  /// The decoded JSON payload
  pub data: Arc<Value>,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was stored (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl CachedResponse {
  /// Fresh data straight from the network.
  pub fn from_network(data: Arc<Value>) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  /// Data served from the store.
  pub fn from_cache(data: Arc<Value>, cached_at: DateTime<Utc>, is_stale: bool) -> Self {
    Self {
      data,
      source: if is_stale {
        CacheSource::CacheStale
      } else {
        CacheSource::CacheFresh
      },
      cached_at: Some(cached_at),
    }
  }

  /// The network failed and an older entry was served instead.
  pub fn offline(data: Arc<Value>, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Offline,
      cached_at: Some(cached_at),
    }
  }
}

/// Indicates where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Data from cache, still considered fresh
  CacheFresh,
  /// Data from cache, a background refresh was started or is running
  CacheStale,
  /// Network failed, serving whatever the cache still had
  Offline,
}

impl CacheSource {
  pub fn label(self) -> &'static str {
    match self {
      CacheSource::Network => "live",
      CacheSource::CacheFresh => "cached",
      CacheSource::CacheStale => "cached, refreshing",
      CacheSource::Offline => "offline",
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn classify_respects_window_edges() {
    let policy = CachePolicy::default();
    assert_eq!(policy.classify(Duration::ZERO), Freshness::Fresh);
    assert_eq!(
      policy.classify(Duration::from_millis(119_999)),
      Freshness::Fresh
    );
    assert_eq!(
      policy.classify(Duration::from_millis(120_000)),
      Freshness::Stale
    );
    assert_eq!(
      policy.classify(Duration::from_millis(599_999)),
      Freshness::Stale
    );
    assert_eq!(
      policy.classify(Duration::from_millis(600_000)),
      Freshness::Expired
    );
  }

  #[test]
  fn keys_round_trip_through_split() {
    let key = cache_key(&Method::GET, "/api/psx/stocks?limit=5");
    assert_eq!(key, "GET:/api/psx/stocks?limit=5");

    let (method, path) = split_key(&key).unwrap();
    assert_eq!(method, Method::GET);
    assert_eq!(path, "/api/psx/stocks?limit=5");
  }
}
