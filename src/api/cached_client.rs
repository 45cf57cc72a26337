//! Cached PK Finance client that routes every call through the response cache.

use chrono::{DateTime, Utc};
use color_eyre::Result;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

use crate::cache::{CacheSource, CacheStats, CachedResponse, ResponseCache};
use crate::config::Config;

use super::client::{HttpTransport, Transport};
use super::error::FetchError;
use super::types::{
  Domain, Fund, FundCategories, FundQuery, FundStats, HealthReport, ListEnvelope, MarketIndex,
  MarketSummary, ScrapeAck, ShortList, Stock, StockDetail, StockQuery,
};

/// A decoded payload together with where it came from.
#[derive(Debug, Clone)]
pub struct Fetched<D> {
  pub data: D,
  pub source: CacheSource,
  pub cached_at: Option<DateTime<Utc>>,
}

/// PK Finance client with transparent caching.
///
/// Reads go through the stale-while-revalidate cache; scrape triggers bypass
/// it and invalidate the affected domain on success.
pub struct PkFinanceClient<T: Transport = HttpTransport> {
  cache: ResponseCache<T>,
}

impl<T: Transport> Clone for PkFinanceClient<T> {
  fn clone(&self) -> Self {
    Self {
      cache: self.cache.clone(),
    }
  }
}

impl PkFinanceClient<HttpTransport> {
  /// Create a client for the configured API.
  pub fn new(config: &Config) -> Result<Self> {
    let transport = HttpTransport::new(&config.api)?;
    info!(base_url = %transport.base_url(), "using PK Finance API");
    let cache = ResponseCache::new(transport).with_policy(config.cache.policy());
    Ok(Self { cache })
  }
}

impl<T: Transport> PkFinanceClient<T> {
  pub fn with_cache(cache: ResponseCache<T>) -> Self {
    Self { cache }
  }

  pub fn stats(&self) -> CacheStats {
    self.cache.stats()
  }

  /// Combined readiness of both scrapers.
  pub async fn health(&self) -> Result<Fetched<HealthReport>, FetchError> {
    self.get("/api/health").await
  }

  pub async fn funds(&self, query: &FundQuery) -> Result<Fetched<ListEnvelope<Fund>>, FetchError> {
    self.get(&query.to_path()).await
  }

  pub async fn search_funds(&self, term: &str) -> Result<Fetched<ShortList<Fund>>, FetchError> {
    self.get(&with_query("/api/mufap/funds/search", &[("q", term)])).await
  }

  pub async fn fund_categories(&self) -> Result<Fetched<FundCategories>, FetchError> {
    self.get("/api/mufap/funds/categories").await
  }

  pub async fn funds_in_category(
    &self,
    category: &str,
  ) -> Result<Fetched<ShortList<Fund>>, FetchError> {
    let path = segment_path("/api/mufap/funds/category/", category)?;
    self.get(&path).await
  }

  /// Highest-NAV funds, optionally within a category.
  pub async fn top_nav(
    &self,
    limit: usize,
    category: Option<&str>,
  ) -> Result<Fetched<ShortList<Fund>>, FetchError> {
    let limit = limit.to_string();
    let mut params = vec![("limit", limit.as_str())];
    if let Some(category) = category {
      params.push(("category", category));
    }
    self.get(&with_query("/api/mufap/funds/top-nav", &params)).await
  }

  pub async fn fund_stats(&self, category: Option<&str>) -> Result<Fetched<FundStats>, FetchError> {
    let params: Vec<_> = category.map(|c| ("category", c)).into_iter().collect();
    self.get(&with_query("/api/mufap/funds/stats", &params)).await
  }

  pub async fn stocks(
    &self,
    query: &StockQuery,
  ) -> Result<Fetched<ListEnvelope<Stock>>, FetchError> {
    self.get(&query.to_path()).await
  }

  pub async fn search_stocks(&self, symbol: &str) -> Result<Fetched<ShortList<Stock>>, FetchError> {
    self
      .get(&with_query("/api/psx/stocks/search", &[("symbol", symbol)]))
      .await
  }

  pub async fn gainers(&self, limit: usize) -> Result<Fetched<ShortList<Stock>>, FetchError> {
    self.ranking("gainers", limit).await
  }

  pub async fn losers(&self, limit: usize) -> Result<Fetched<ShortList<Stock>>, FetchError> {
    self.ranking("losers", limit).await
  }

  pub async fn most_active(&self, limit: usize) -> Result<Fetched<ShortList<Stock>>, FetchError> {
    self.ranking("active", limit).await
  }

  pub async fn market_summary(&self) -> Result<Fetched<MarketSummary>, FetchError> {
    self.get("/api/psx/stocks/summary").await
  }

  pub async fn stock(&self, symbol: &str) -> Result<Fetched<StockDetail>, FetchError> {
    let path = segment_path("/api/psx/stocks/", &symbol.to_uppercase())?;
    self.get(&path).await
  }

  pub async fn indices(&self) -> Result<Fetched<ShortList<MarketIndex>>, FetchError> {
    self.get("/api/psx/indices").await
  }

  /// Ask the backend to re-scrape a domain (not cached - write operation).
  ///
  /// On success every cached response of that domain is dropped so the
  /// next read observes the new data.
  pub async fn trigger_scrape(&self, domain: Domain) -> Result<ScrapeAck, FetchError> {
    let response = self
      .cache
      .request_with_source(Method::POST, &domain.scrape_path(), None)
      .await?;
    let ack: ScrapeAck = decode(&response)?;

    let removed = self.cache.invalidate(domain.prefix());
    info!(%domain, status = %ack.status, removed, "scrape triggered");
    Ok(ack)
  }

  /// Any GET endpoint as raw JSON, still served through the cache.
  pub async fn raw(&self, path: &str) -> Result<Arc<Value>, FetchError> {
    self.cache.request(Method::GET, path, None).await
  }

  /// Refresh every cached response in the background.
  pub fn revalidate_all(&self) -> usize {
    let count = self.cache.revalidate_all();
    debug!(count, "revalidating cached responses");
    count
  }

  /// Forget everything cached, as a manual "refresh everything" would.
  pub fn refresh_all(&self) {
    self.cache.clear_all();
    info!("cleared all cached responses");
  }

  async fn ranking(
    &self,
    name: &str,
    limit: usize,
  ) -> Result<Fetched<ShortList<Stock>>, FetchError> {
    let limit = limit.to_string();
    let path = with_query(&format!("/api/psx/stocks/{}", name), &[("limit", limit.as_str())]);
    self.get(&path).await
  }

  async fn get<D: DeserializeOwned>(&self, path: &str) -> Result<Fetched<D>, FetchError> {
    let response = self
      .cache
      .request_with_source(Method::GET, path, None)
      .await?;
    Ok(Fetched {
      data: decode(&response)?,
      source: response.source,
      cached_at: response.cached_at,
    })
  }
}

fn decode<D: DeserializeOwned>(response: &CachedResponse) -> Result<D, FetchError> {
  D::deserialize(&*response.data).map_err(|e| FetchError::Decode(e.to_string()))
}

fn with_query(path: &str, params: &[(&str, &str)]) -> String {
  if params.is_empty() {
    return path.to_string();
  }
  let encoded = url::form_urlencoded::Serializer::new(String::new())
    .extend_pairs(params)
    .finish();
  format!("{}?{}", path, encoded)
}

/// Append `segment` to `base`, percent-encoding it as a single path segment.
fn segment_path(base: &str, segment: &str) -> Result<String, FetchError> {
  let mut url = Url::parse("http://localhost/")
    .map_err(|e| FetchError::Network(format!("invalid path: {}", e)))?;
  url.set_path(base);
  url
    .path_segments_mut()
    .map_err(|_| FetchError::Network(format!("invalid path: {}", base)))?
    .pop_if_empty()
    .push(segment);
  Ok(url.path().to_string())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::testing::ScriptedTransport;
  use serde_json::json;

  fn client(transport: ScriptedTransport) -> PkFinanceClient<ScriptedTransport> {
    PkFinanceClient::with_cache(ResponseCache::new(transport))
  }

  fn funds_payload() -> serde_json::Value {
    json!({
      "count": 1, "total_filtered": 1, "total_available": 310, "offset": 0, "limit": 1000,
      "last_scrape": "2025-03-04T09:00:00+05:00",
      "data": [{
        "fund_name": "Meezan Islamic Fund", "fund_category": "Equity",
        "offer_price": 80.1, "repurchase_price": 78.2, "nav": 78.9,
        "date_updated": "2025-03-03", "trustee": "CDC"
      }]
    })
  }

  #[tokio::test(start_paused = true)]
  async fn funds_decode_and_report_source() {
    let transport = ScriptedTransport::new().respond("/api/mufap/funds", funds_payload());
    let client = client(transport.clone());

    let first = client.funds(&FundQuery::default()).await.unwrap();
    assert_eq!(first.source, CacheSource::Network);
    assert_eq!(first.data.total_available, Some(310));
    assert_eq!(first.data.data[0].fund_name, "Meezan Islamic Fund");

    let second = client.funds(&FundQuery::default()).await.unwrap();
    assert_eq!(second.source, CacheSource::CacheFresh);
    assert_eq!(transport.calls(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn category_listing_encodes_the_category() {
    let path = "/api/mufap/funds/category/Money%20Market";
    let transport = ScriptedTransport::new().respond(
      path,
      json!({"count": 1, "data": [{
        "fund_name": "HBL Cash Fund", "fund_category": "Money Market", "nav": 104.2
      }]}),
    );
    let client = client(transport.clone());

    let fetched = client.funds_in_category("Money Market").await.unwrap();
    assert_eq!(fetched.data.count, 1);
    assert_eq!(fetched.data.data[0].fund_name, "HBL Cash Fund");

    let keys: Vec<_> = transport.log().into_iter().map(|(_, path, _)| path).collect();
    assert_eq!(keys, vec![path.to_string()]);
  }

  #[tokio::test(start_paused = true)]
  async fn scrape_trigger_invalidates_its_domain() {
    let transport = ScriptedTransport::new()
      .respond("/api/mufap/funds", funds_payload())
      .respond(
        "/api/mufap/scrape",
        json!({"status": "scrape_started", "message": "Scraping MUFAP in background."}),
      )
      .respond("/api/psx/indices", json!({"count": 0, "data": []}));
    let client = client(transport.clone());

    client.funds(&FundQuery::default()).await.unwrap();
    client.indices().await.unwrap();

    let ack = client.trigger_scrape(Domain::Mufap).await.unwrap();
    assert_eq!(ack.status, "scrape_started");
    assert_eq!(client.stats().entries, 1);

    client.funds(&FundQuery::default()).await.unwrap();
    client.indices().await.unwrap();
    assert_eq!(transport.calls(), 4);

    let posts: Vec<_> = transport
      .log()
      .into_iter()
      .filter(|(method, _, _)| *method == Method::POST)
      .map(|(_, path, _)| path)
      .collect();
    assert_eq!(posts, vec!["/api/mufap/scrape".to_string()]);
  }

  #[tokio::test(start_paused = true)]
  async fn failed_scrape_keeps_cache() {
    let transport = ScriptedTransport::new().respond("/api/mufap/funds", funds_payload());
    let client = client(transport.clone());
    client.funds(&FundQuery::default()).await.unwrap();

    transport.set_failure(Some(FetchError::Http { status: 500 }));
    let err = client.trigger_scrape(Domain::Mufap).await.unwrap_err();
    assert_eq!(err, FetchError::Http { status: 500 });
    assert_eq!(client.stats().entries, 1);
  }

  #[tokio::test(start_paused = true)]
  async fn refresh_all_forces_refetch() {
    let transport = ScriptedTransport::new().respond("/api/psx/indices", json!({"count": 0, "data": []}));
    let client = client(transport.clone());

    client.indices().await.unwrap();
    client.refresh_all();
    let again = client.indices().await.unwrap();

    assert_eq!(again.source, CacheSource::Network);
    assert_eq!(transport.calls(), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn unexpected_shape_is_a_decode_error() {
    let transport = ScriptedTransport::new().respond("/api/psx/stocks/summary", json!({"oops": true}));
    let client = client(transport);

    let err = client.market_summary().await.unwrap_err();
    assert!(matches!(err, FetchError::Decode(_)));
  }

  #[test]
  fn path_segments_are_encoded() {
    assert_eq!(
      segment_path("/api/mufap/funds/category/", "Money Market").unwrap(),
      "/api/mufap/funds/category/Money%20Market"
    );
    assert_eq!(
      segment_path("/api/psx/stocks/", "A/B").unwrap(),
      "/api/psx/stocks/A%2FB"
    );
    assert_eq!(
      with_query("/api/psx/stocks/gainers", &[("limit", "10")]),
      "/api/psx/stocks/gainers?limit=10"
    );
  }
}
