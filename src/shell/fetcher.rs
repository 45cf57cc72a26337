//! Network access for the offline shell.

use color_eyre::{eyre::eyre, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::header::{ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE};
use reqwest::Method;
use std::time::Duration;
use url::{Origin, Url};

use super::{AssetResponse, ResponseKind};
use crate::api::FetchError;

/// Fetches raw responses. Unlike the API transport, non-2xx statuses are
/// returned as responses; only transport failures are errors.
pub trait AssetFetcher: Send + Sync {
  fn fetch(&self, method: Method, url: &Url) -> BoxFuture<'static, Result<AssetResponse, FetchError>>;
}

/// reqwest-backed asset fetcher.
pub struct HttpAssetFetcher {
  client: reqwest::Client,
  origin: Origin,
}

impl HttpAssetFetcher {
  pub fn new(origin: &Url, timeout: Duration) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      client,
      origin: origin.origin(),
    })
  }
}

impl AssetFetcher for HttpAssetFetcher {
  fn fetch(&self, method: Method, url: &Url) -> BoxFuture<'static, Result<AssetResponse, FetchError>> {
    let request = self.client.request(method, url.clone());
    let same_origin = url.origin() == self.origin;

    async move {
      let response = request
        .send()
        .await
        .map_err(|e| FetchError::Network(e.to_string()))?;

      let kind = if same_origin {
        ResponseKind::Basic
      } else if response.headers().contains_key(ACCESS_CONTROL_ALLOW_ORIGIN) {
        ResponseKind::Cors
      } else {
        ResponseKind::Opaque
      };
      let status = response.status().as_u16();
      let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
      let body = response
        .bytes()
        .await
        .map_err(|e| FetchError::Network(e.to_string()))?
        .to_vec();

      Ok(AssetResponse {
        status,
        kind,
        content_type,
        body,
      })
    }
    .boxed()
  }
}
