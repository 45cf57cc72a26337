//! Registry of requests currently on the wire.

use futures::future::{BoxFuture, Shared};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::api::FetchError;

/// A request every interested caller can await.
pub type SharedFetch = Shared<BoxFuture<'static, Result<Arc<Value>, FetchError>>>;

struct InFlight {
  ticket: u64,
  pending: SharedFetch,
}

/// At most one pending request per key.
///
/// Each registration carries a ticket so that a request settling after a
/// `clear` can never remove a newer registration for the same key.
#[derive(Default)]
pub struct InFlightRegistry {
  next_ticket: u64,
  requests: HashMap<String, InFlight>,
}

impl InFlightRegistry {
  /// Hand out the ticket for a request about to be registered.
  pub fn reserve_ticket(&mut self) -> u64 {
    self.next_ticket += 1;
    self.next_ticket
  }

  pub fn register(&mut self, key: String, ticket: u64, pending: SharedFetch) {
    self.requests.insert(key, InFlight { ticket, pending });
  }

  pub fn get(&self, key: &str) -> Option<SharedFetch> {
    self.requests.get(key).map(|r| r.pending.clone())
  }

  pub fn contains(&self, key: &str) -> bool {
    self.requests.contains_key(key)
  }

  /// Drop the registration for `key` if it still belongs to `ticket`.
  pub fn settle(&mut self, key: &str, ticket: u64) -> bool {
    match self.requests.get(key) {
      Some(r) if r.ticket == ticket => {
        self.requests.remove(key);
        true
      }
      _ => false,
    }
  }

  /// Forget every registration. The underlying requests keep running.
  pub fn clear(&mut self) -> usize {
    let removed = self.requests.len();
    self.requests.clear();
    removed
  }

  pub fn len(&self) -> usize {
    self.requests.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use futures::FutureExt;
  use serde_json::json;

  fn ready(value: Value) -> SharedFetch {
    async move { Ok(Arc::new(value)) }.boxed().shared()
  }

  #[test]
  fn settle_ignores_stale_tickets() {
    let mut registry = InFlightRegistry::default();
    let first = registry.reserve_ticket();
    registry.register("GET:/a".into(), first, ready(json!(1)));

    registry.clear();
    let second = registry.reserve_ticket();
    registry.register("GET:/a".into(), second, ready(json!(2)));

    assert!(!registry.settle("GET:/a", first));
    assert!(registry.contains("GET:/a"));
    assert!(registry.settle("GET:/a", second));
    assert_eq!(registry.len(), 0);
  }
}
