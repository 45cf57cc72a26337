//! Decides how an intercepted request is served.

use reqwest::Method;
use url::Url;

/// Whether the request loads a document or a subresource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
  Navigate,
  Subresource,
}

/// A request seen by the offline shell.
#[derive(Debug, Clone)]
pub struct ShellRequest {
  pub method: Method,
  pub url: Url,
  pub mode: RequestMode,
}

impl ShellRequest {
  pub fn get(url: Url, mode: RequestMode) -> Self {
    Self {
      method: Method::GET,
      url,
      mode,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
  /// Straight to the network, never cached
  NetworkOnly,
  /// Serve from the asset cache, fall back to the network and keep a copy
  CacheFirst,
}

/// Routing rules of the shell.
#[derive(Debug, Clone)]
pub struct RoutePolicy {
  pub origin: Url,
  pub api_prefix: String,
  pub bypass_cross_origin: bool,
}

impl RoutePolicy {
  pub fn is_same_origin(&self, url: &Url) -> bool {
    url.origin() == self.origin.origin()
  }

  pub fn route(&self, request: &ShellRequest) -> Route {
    if request.method != Method::GET {
      return Route::NetworkOnly;
    }
    let same_origin = self.is_same_origin(&request.url);
    if same_origin && request.url.path().starts_with(&self.api_prefix) {
      return Route::NetworkOnly;
    }
    if !same_origin && self.bypass_cross_origin {
      return Route::NetworkOnly;
    }
    Route::CacheFirst
  }
}
