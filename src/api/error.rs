//! Error taxonomy for upstream API calls.

use thiserror::Error;

/// Failure of a single upstream request.
///
/// Cloneable so every caller attached to a deduplicated request receives
/// the same error value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
  /// Transport-level failure (DNS, connect, TLS, reset).
  #[error("network error: {0}")]
  Network(String),

  /// A response arrived with a status outside 2xx.
  #[error("upstream returned HTTP {status}")]
  Http { status: u16 },

  /// The body was not the JSON we expected.
  #[error("failed to decode response: {0}")]
  Decode(String),

  /// The spawned request task panicked or the runtime shut down under it.
  #[error("request task aborted")]
  Aborted,
}

impl FetchError {
  /// Status code for HTTP failures.
  pub fn status(&self) -> Option<u16> {
    match self {
      Self::Http { status } => Some(*status),
      _ => None,
    }
  }
}

impl From<reqwest::Error> for FetchError {
  fn from(err: reqwest::Error) -> Self {
    if let Some(status) = err.status() {
      Self::Http {
        status: status.as_u16(),
      }
    } else if err.is_decode() {
      Self::Decode(err.to_string())
    } else {
      Self::Network(err.to_string())
    }
  }
}
