//! Cache layer that orchestrates caching logic with network fetching.

use futures::FutureExt;
use reqwest::Method;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::inflight::{InFlightRegistry, SharedFetch};
use super::store::ResponseStore;
use super::traits::{cache_key, split_key, CachePolicy, CachedResponse, Freshness};
use crate::api::{FetchError, Transport};

/// Store and in-flight registry, locked together so the
/// check-then-register sequence of a read is atomic.
#[derive(Default)]
struct CacheState {
  store: ResponseStore,
  inflight: InFlightRegistry,
}

/// Counters exposed for the dashboard status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
  pub entries: usize,
  pub in_flight: usize,
}

/// Stale-while-revalidate response cache with single-flight GETs.
///
/// This layer sits between the typed API client and the transport. Clones
/// share the same store, so one value can be handed to every task.
pub struct ResponseCache<T: Transport> {
  transport: Arc<T>,
  state: Arc<Mutex<CacheState>>,
  policy: CachePolicy,
}

impl<T: Transport> ResponseCache<T> {
  /// Create a new cache with the default freshness windows.
  pub fn new(transport: T) -> Self {
    Self {
      transport: Arc::new(transport),
      state: Arc::new(Mutex::new(CacheState::default())),
      policy: CachePolicy::default(),
    }
  }

  /// Set the freshness windows.
  pub fn with_policy(mut self, policy: CachePolicy) -> Self {
    self.policy = policy;
    self
  }

  /// Issue a request and return only the payload.
  pub async fn request(
    &self,
    method: Method,
    path: &str,
    body: Option<Value>,
  ) -> Result<Arc<Value>, FetchError> {
    self
      .request_with_source(method, path, body)
      .await
      .map(|r| r.data)
  }

  /// Issue a request through the cache.
  ///
  /// GET:
  /// 1. Fresh entry - return it, no network
  /// 2. Stale entry - return it, refresh in the background
  /// 3. Missing/expired - attach to the in-flight request or start one
  /// 4. On network failure, fall back to any entry for the key
  ///
  /// Any other method goes straight to the transport. Bodies of GET
  /// requests are not part of the key and are not sent.
  pub async fn request_with_source(
    &self,
    method: Method,
    path: &str,
    body: Option<Value>,
  ) -> Result<CachedResponse, FetchError> {
    if method != Method::GET {
      debug!(%method, path, "bypassing cache");
      let value = self.transport.send(method, path, body).await?;
      return Ok(CachedResponse::from_network(Arc::new(value)));
    }

    let key = cache_key(&method, path);

    let pending = {
      let mut state = self.lock_state();

      if let Some(entry) = state.store.get(&key) {
        match entry.freshness(Instant::now(), &self.policy) {
          Freshness::Fresh => {
            debug!(key = %key, "cache hit (fresh)");
            return Ok(CachedResponse::from_cache(
              Arc::clone(&entry.payload),
              entry.stored_at,
              false,
            ));
          }
          Freshness::Stale => {
            let hit = CachedResponse::from_cache(Arc::clone(&entry.payload), entry.stored_at, true);
            if state.inflight.contains(&key) {
              debug!(key = %key, "cache hit (stale), refresh already running");
            } else {
              debug!(key = %key, "cache hit (stale), revalidating in background");
              // The spawned task settles and stores on its own
              drop(self.start_fetch(&mut state, &key, path));
            }
            return Ok(hit);
          }
          Freshness::Expired => debug!(key = %key, "cache entry expired"),
        }
      }

      match state.inflight.get(&key) {
        Some(pending) => {
          debug!(key = %key, "joining in-flight request");
          pending
        }
        None => {
          debug!(key = %key, "cache miss, fetching");
          self.start_fetch(&mut state, &key, path)
        }
      }
    };

    match pending.await {
      Ok(payload) => Ok(CachedResponse::from_network(payload)),
      Err(err) => {
        let state = self.lock_state();
        match state.store.get(&key) {
          Some(entry) => {
            warn!(key = %key, error = %err, "request failed, serving cached data");
            Ok(CachedResponse::offline(
              Arc::clone(&entry.payload),
              entry.stored_at,
            ))
          }
          None => Err(err),
        }
      }
    }
  }

  /// Refresh `key` in the background unless a request for it is already
  /// running. Failures are discarded.
  pub fn revalidate(&self, key: &str) {
    let Some((method, path)) = split_key(key) else {
      debug!(key, "not a cache key, skipping revalidation");
      return;
    };
    if method != Method::GET {
      return;
    }

    let mut state = self.lock_state();
    if !state.inflight.contains(key) {
      // Fire and forget, the spawned task settles and stores on its own
      drop(self.start_fetch(&mut state, key, path));
    }
  }

  /// Revalidate every cached key in the background, keeping the current
  /// entries visible until the refreshed payloads land. Returns the number
  /// of keys considered.
  pub fn revalidate_all(&self) -> usize {
    let keys: Vec<String> = self.lock_state().store.keys().map(String::from).collect();
    for key in &keys {
      self.revalidate(key);
    }
    keys.len()
  }

  /// Remove every entry whose key contains `needle`. Returns how many were removed.
  pub fn invalidate(&self, needle: &str) -> usize {
    let removed = self.lock_state().store.remove_matching(needle);
    debug!(needle, removed, "invalidated cache entries");
    removed
  }

  /// Drop every entry and forget every in-flight registration.
  ///
  /// Requests already on the wire still complete and repopulate the store.
  pub fn clear_all(&self) {
    let mut state = self.lock_state();
    let entries = state.store.clear();
    let in_flight = state.inflight.clear();
    debug!(entries, in_flight, "cleared response cache");
  }

  pub fn stats(&self) -> CacheStats {
    let state = self.lock_state();
    CacheStats {
      entries: state.store.len(),
      in_flight: state.inflight.len(),
    }
  }

  /// Spawn the network call for `key` and register it.
  ///
  /// Must be called with the state lock held: the spawned task needs the
  /// same lock to settle, so it cannot finish before it is registered.
  fn start_fetch(&self, state: &mut CacheState, key: &str, path: &str) -> SharedFetch {
    let ticket = state.inflight.reserve_ticket();

    let request = self.transport.send(Method::GET, path, None);
    let task_state = Arc::clone(&self.state);
    let task_key = key.to_string();
    let handle = tokio::spawn(async move {
      let result = request.await.map(Arc::new);

      let mut state = lock(&task_state);
      match &result {
        Ok(payload) => state.store.insert(task_key.clone(), Arc::clone(payload)),
        Err(err) => debug!(key = %task_key, error = %err, "fetch failed"),
      }
      state.inflight.settle(&task_key, ticket);
      result
    });

    let join_state = Arc::clone(&self.state);
    let join_key = key.to_string();
    let pending = async move {
      match handle.await {
        Ok(result) => result,
        Err(err) => {
          warn!(key = %join_key, error = %err, "fetch task aborted");
          lock(&join_state).inflight.settle(&join_key, ticket);
          Err(FetchError::Aborted)
        }
      }
    }
    .boxed()
    .shared();

    state
      .inflight
      .register(key.to_string(), ticket, pending.clone());
    pending
  }

  fn lock_state(&self) -> MutexGuard<'_, CacheState> {
    lock(&self.state)
  }
}

/// The state holds plain maps, so a poisoned lock is still consistent.
fn lock(state: &Mutex<CacheState>) -> MutexGuard<'_, CacheState> {
  state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: Transport> Clone for ResponseCache<T> {
  fn clone(&self) -> Self {
    Self {
      transport: Arc::clone(&self.transport),
      state: Arc::clone(&self.state),
      policy: self.policy,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::testing::ScriptedTransport;
  use crate::cache::CacheSource;
  use serde_json::json;
  use std::time::Duration;

  const FUNDS: &str = "/api/mufap/funds";

  fn cache(transport: ScriptedTransport) -> ResponseCache<ScriptedTransport> {
    ResponseCache::new(transport)
  }

  /// Let spawned fetches finish. Sleeping lets the paused clock advance.
  async fn settle(cache: &ResponseCache<ScriptedTransport>) {
    while cache.stats().in_flight > 0 {
      tokio::time::sleep(Duration::from_millis(1)).await;
    }
  }

  #[tokio::test(start_paused = true)]
  async fn concurrent_gets_share_one_network_call() {
    let transport = ScriptedTransport::new().with_delay(Duration::from_millis(50));
    let cache = cache(transport.clone());

    let results = futures::future::join_all(
      (0..5).map(|_| cache.request(Method::GET, FUNDS, None)),
    )
    .await;

    assert_eq!(transport.calls(), 1);
    for result in results {
      assert_eq!(*result.unwrap(), json!({"call": 1, "path": FUNDS}));
    }
  }

  #[tokio::test(start_paused = true)]
  async fn concurrent_gets_share_one_error() {
    let transport = ScriptedTransport::new()
      .with_delay(Duration::from_millis(50))
      .fail_with(FetchError::Http { status: 503 });
    let cache = cache(transport.clone());

    let results = futures::future::join_all(
      (0..3).map(|_| cache.request(Method::GET, FUNDS, None)),
    )
    .await;

    assert_eq!(transport.calls(), 1);
    for result in results {
      assert_eq!(result.unwrap_err(), FetchError::Http { status: 503 });
    }
    assert_eq!(cache.stats(), CacheStats { entries: 0, in_flight: 0 });
  }

  #[tokio::test(start_paused = true)]
  async fn fresh_window_serves_without_network() {
    let transport = ScriptedTransport::new();
    let cache = cache(transport.clone());

    cache.request(Method::GET, FUNDS, None).await.unwrap();
    tokio::time::advance(Duration::from_millis(119_999)).await;

    let response = cache
      .request_with_source(Method::GET, FUNDS, None)
      .await
      .unwrap();
    assert_eq!(response.source, CacheSource::CacheFresh);
    assert_eq!(transport.calls(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn stale_window_serves_cached_and_revalidates_once() {
    let transport = ScriptedTransport::new();
    let cache = cache(transport.clone());

    cache.request(Method::GET, FUNDS, None).await.unwrap();
    tokio::time::advance(Duration::from_millis(120_001)).await;

    let first = cache
      .request_with_source(Method::GET, FUNDS, None)
      .await
      .unwrap();
    let second = cache
      .request_with_source(Method::GET, FUNDS, None)
      .await
      .unwrap();
    assert_eq!(first.source, CacheSource::CacheStale);
    assert_eq!(second.source, CacheSource::CacheStale);
    assert_eq!(*first.data, json!({"call": 1, "path": FUNDS}));

    settle(&cache).await;
    assert_eq!(transport.calls(), 2);

    let refreshed = cache
      .request_with_source(Method::GET, FUNDS, None)
      .await
      .unwrap();
    assert_eq!(refreshed.source, CacheSource::CacheFresh);
    assert_eq!(*refreshed.data, json!({"call": 2, "path": FUNDS}));
  }

  #[tokio::test(start_paused = true)]
  async fn expired_entry_is_a_blocking_miss() {
    let transport = ScriptedTransport::new();
    let cache = cache(transport.clone());

    cache.request(Method::GET, FUNDS, None).await.unwrap();
    tokio::time::advance(Duration::from_millis(600_001)).await;

    let response = cache
      .request_with_source(Method::GET, FUNDS, None)
      .await
      .unwrap();
    assert_eq!(response.source, CacheSource::Network);
    assert_eq!(*response.data, json!({"call": 2, "path": FUNDS}));
    assert_eq!(transport.calls(), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn failed_refetch_falls_back_to_expired_entry() {
    let transport = ScriptedTransport::new();
    let cache = cache(transport.clone());

    cache.request(Method::GET, FUNDS, None).await.unwrap();
    tokio::time::advance(Duration::from_millis(600_001)).await;
    transport.set_failure(Some(FetchError::Network("connection refused".into())));

    let response = cache
      .request_with_source(Method::GET, FUNDS, None)
      .await
      .unwrap();
    assert_eq!(response.source, CacheSource::Offline);
    assert_eq!(*response.data, json!({"call": 1, "path": FUNDS}));
  }

  #[tokio::test(start_paused = true)]
  async fn failure_without_fallback_propagates_and_stores_nothing() {
    let transport = ScriptedTransport::new().fail_with(FetchError::Http { status: 404 });
    let cache = cache(transport.clone());

    let err = cache.request(Method::GET, FUNDS, None).await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert_eq!(cache.stats().entries, 0);
  }

  #[tokio::test(start_paused = true)]
  async fn failed_background_revalidation_is_silent() {
    let transport = ScriptedTransport::new();
    let cache = cache(transport.clone());

    cache.request(Method::GET, FUNDS, None).await.unwrap();
    tokio::time::advance(Duration::from_millis(200_000)).await;
    transport.set_failure(Some(FetchError::Http { status: 500 }));

    let response = cache
      .request_with_source(Method::GET, FUNDS, None)
      .await
      .unwrap();
    assert_eq!(response.source, CacheSource::CacheStale);
    settle(&cache).await;

    assert_eq!(transport.calls(), 2);
    let again = cache.request(Method::GET, FUNDS, None).await.unwrap();
    assert_eq!(*again, json!({"call": 1, "path": FUNDS}));
  }

  #[tokio::test(start_paused = true)]
  async fn invalidate_removes_only_matching_keys() {
    let transport = ScriptedTransport::new();
    let cache = cache(transport.clone());

    cache.request(Method::GET, FUNDS, None).await.unwrap();
    cache
      .request(Method::GET, "/api/psx/stocks", None)
      .await
      .unwrap();

    assert_eq!(cache.invalidate("/api/mufap/"), 1);
    assert_eq!(cache.stats().entries, 1);

    cache
      .request(Method::GET, "/api/psx/stocks", None)
      .await
      .unwrap();
    assert_eq!(transport.calls(), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn posts_bypass_cache_and_dedup() {
    let transport = ScriptedTransport::new().with_delay(Duration::from_millis(10));
    let cache = cache(transport.clone());

    let (a, b) = tokio::join!(
      cache.request(Method::POST, "/api/psx/scrape", None),
      cache.request(Method::POST, "/api/psx/scrape", None),
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(transport.calls(), 2);
    assert_eq!(cache.stats(), CacheStats { entries: 0, in_flight: 0 });
  }

  #[tokio::test(start_paused = true)]
  async fn post_failures_propagate_even_with_cached_get() {
    let transport = ScriptedTransport::new();
    let cache = cache(transport.clone());

    cache.request(Method::GET, FUNDS, None).await.unwrap();
    transport.set_failure(Some(FetchError::Http { status: 502 }));

    let err = cache
      .request(Method::POST, FUNDS, Some(json!({})))
      .await
      .unwrap_err();
    assert_eq!(err, FetchError::Http { status: 502 });
  }

  #[tokio::test(start_paused = true)]
  async fn clear_all_lets_in_flight_requests_repopulate() {
    let transport = ScriptedTransport::new().with_delay(Duration::from_millis(50));
    let cache = cache(transport.clone());

    let background = cache.clone();
    let waiter = tokio::spawn(async move { background.request(Method::GET, FUNDS, None).await });
    while cache.stats().in_flight == 0 {
      tokio::task::yield_now().await;
    }

    cache.clear_all();
    assert_eq!(cache.stats().in_flight, 0);

    waiter.await.unwrap().unwrap();
    assert_eq!(cache.stats().entries, 1);

    let cached = cache
      .request_with_source(Method::GET, FUNDS, None)
      .await
      .unwrap();
    assert_eq!(cached.source, CacheSource::CacheFresh);
    assert_eq!(transport.calls(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn dropped_caller_does_not_cancel_fetch() {
    let transport = ScriptedTransport::new().with_delay(Duration::from_millis(50));
    let cache = cache(transport.clone());

    let abandoned = tokio::time::timeout(
      Duration::from_millis(10),
      cache.request(Method::GET, FUNDS, None),
    )
    .await;
    assert!(abandoned.is_err());

    settle(&cache).await;
    assert_eq!(cache.stats().entries, 1);
  }

  #[tokio::test(start_paused = true)]
  async fn explicit_revalidate_joins_existing_request() {
    let transport = ScriptedTransport::new().with_delay(Duration::from_millis(50));
    let cache = cache(transport.clone());

    let key = cache_key(&Method::GET, FUNDS);
    cache.revalidate(&key);
    cache.revalidate(&key);
    cache.request(Method::GET, FUNDS, None).await.unwrap();

    assert_eq!(transport.calls(), 1);
    cache.revalidate("POST:/api/mufap/scrape");
    assert_eq!(cache.stats().in_flight, 0);
  }

  #[tokio::test(start_paused = true)]
  async fn revalidate_all_refreshes_every_entry_in_place() {
    let transport = ScriptedTransport::new();
    let cache = cache(transport.clone());
    cache.request(Method::GET, FUNDS, None).await.unwrap();
    cache.request(Method::GET, "/api/psx/indices", None).await.unwrap();

    assert_eq!(cache.revalidate_all(), 2);
    settle(&cache).await;

    assert_eq!(transport.calls(), 4);
    assert_eq!(cache.stats().entries, 2);
    let refreshed = cache
      .request_with_source(Method::GET, FUNDS, None)
      .await
      .unwrap();
    assert_eq!(refreshed.source, CacheSource::CacheFresh);
    assert_ne!(*refreshed.data, json!({"call": 1, "path": FUNDS}));
  }
}
