//! Scripted transport for exercising the cache without a server.

use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::Method;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{FetchError, Transport};

#[derive(Default)]
struct Script {
  failure: Option<FetchError>,
  responses: HashMap<String, Value>,
  log: Vec<(Method, String, Option<Value>)>,
}

/// Counts calls and answers `{"call": n, "path": path}` unless a fixed
/// response or failure is configured.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
  calls: Arc<AtomicUsize>,
  delay: Duration,
  script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  pub fn fail_with(self, err: FetchError) -> Self {
    self.set_failure(Some(err));
    self
  }

  pub fn respond(self, path: &str, value: Value) -> Self {
    self
      .script
      .lock()
      .unwrap()
      .responses
      .insert(path.to_string(), value);
    self
  }

  pub fn set_failure(&self, err: Option<FetchError>) {
    self.script.lock().unwrap().failure = err;
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  pub fn log(&self) -> Vec<(Method, String, Option<Value>)> {
    self.script.lock().unwrap().log.clone()
  }
}

impl Transport for ScriptedTransport {
  fn send(
    &self,
    method: Method,
    path: &str,
    body: Option<Value>,
  ) -> BoxFuture<'static, Result<Value, FetchError>> {
    let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
    let delay = self.delay;

    let outcome = {
      let mut script = self.script.lock().unwrap();
      script.log.push((method, path.to_string(), body));
      match &script.failure {
        Some(err) => Err(err.clone()),
        None => Ok(
          script
            .responses
            .get(path)
            .cloned()
            .unwrap_or_else(|| json!({"call": call, "path": path})),
        ),
      }
    };

    async move {
      if !delay.is_zero() {
        tokio::time::sleep(delay).await;
      }
      outcome
    }
    .boxed()
  }
}
