//! Typed views of the upstream JSON payloads.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The two data domains served by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
  /// MUFAP mutual funds
  Mufap,
  /// Pakistan Stock Exchange
  Psx,
}

impl Domain {
  /// Path prefix shared by every endpoint of this domain.
  pub fn prefix(self) -> &'static str {
    match self {
      Domain::Mufap => "/api/mufap/",
      Domain::Psx => "/api/psx/",
    }
  }

  pub fn scrape_path(self) -> String {
    format!("{}scrape", self.prefix())
  }
}

impl fmt::Display for Domain {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Domain::Mufap => f.write_str("mufap"),
      Domain::Psx => f.write_str("psx"),
    }
  }
}

impl FromStr for Domain {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "mufap" | "funds" => Ok(Domain::Mufap),
      "psx" | "stocks" => Ok(Domain::Psx),
      other => Err(format!("unknown domain '{}', expected mufap or psx", other)),
    }
  }
}

/// Paged list envelope returned by `/funds` and `/stocks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListEnvelope<T> {
  pub count: usize,
  #[serde(default)]
  pub total_filtered: Option<usize>,
  /// PSX names this field `total`
  #[serde(default, alias = "total")]
  pub total_available: Option<usize>,
  #[serde(default)]
  pub offset: Option<usize>,
  #[serde(default)]
  pub limit: Option<usize>,
  #[serde(default)]
  pub last_scrape: Option<DateTime<FixedOffset>>,
  pub data: Vec<T>,
}

/// `{count, data}` envelope used by the ranking and search endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortList<T> {
  pub count: usize,
  pub data: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fund {
  pub fund_name: String,
  #[serde(default)]
  pub fund_category: String,
  #[serde(default)]
  pub inception_date: Option<String>,
  #[serde(default)]
  pub offer_price: Option<f64>,
  #[serde(default)]
  pub repurchase_price: Option<f64>,
  pub nav: f64,
  #[serde(default)]
  pub date_updated: Option<String>,
  #[serde(default)]
  pub trustee: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stock {
  pub symbol: String,
  #[serde(default)]
  pub ldcp: Option<f64>,
  #[serde(default)]
  pub open: Option<f64>,
  #[serde(default)]
  pub high: Option<f64>,
  #[serde(default)]
  pub low: Option<f64>,
  #[serde(default)]
  pub current: Option<f64>,
  #[serde(default)]
  pub change: Option<f64>,
  #[serde(default)]
  pub change_pct: Option<f64>,
  #[serde(default)]
  pub volume: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketIndex {
  pub index_name: String,
  #[serde(default)]
  pub value: Option<f64>,
  #[serde(default)]
  pub change: Option<f64>,
  #[serde(default)]
  pub change_pct: Option<f64>,
}

/// Readiness of one scraper as reported by `/api/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainHealth {
  pub ready: bool,
  #[serde(default)]
  pub cached: usize,
  #[serde(default)]
  pub last_scrape: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
  pub status: String,
  pub mufap: DomainHealth,
  pub psx: DomainHealth,
  #[serde(default)]
  pub next_scrape: Option<String>,
}

impl HealthReport {
  pub fn is_healthy(&self) -> bool {
    self.status == "healthy"
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryCount {
  pub category: String,
  pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundCategories {
  pub total_categories: usize,
  pub categories: Vec<CategoryCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavStats {
  pub mean: Option<f64>,
  pub median: Option<f64>,
  pub min: Option<f64>,
  pub max: Option<f64>,
  pub std: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundStats {
  pub total_funds: usize,
  pub total_categories: usize,
  pub nav: NavStats,
  #[serde(default)]
  pub data_date: Option<String>,
  #[serde(default)]
  pub trustees: Vec<String>,
  #[serde(default)]
  pub last_scrape: Option<DateTime<FixedOffset>>,
  #[serde(default)]
  pub category_filter: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSummary {
  pub total_stocks: usize,
  pub gainers: usize,
  pub losers: usize,
  pub unchanged: usize,
  #[serde(default)]
  pub total_volume: u64,
  #[serde(default)]
  pub avg_change_pct: Option<f64>,
  #[serde(default)]
  pub total_traded_value: Option<f64>,
  #[serde(default)]
  pub market_date: Option<String>,
  #[serde(default)]
  pub last_scrape: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockDetail {
  pub symbol: String,
  pub data: Stock,
}

/// Acknowledgement of a background scrape trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeAck {
  pub status: String,
  #[serde(default)]
  pub message: Option<String>,
}

/// Filters accepted by `/api/mufap/funds`.
#[derive(Debug, Clone, Default)]
pub struct FundQuery {
  pub category: Option<String>,
  pub trustee: Option<String>,
  pub min_nav: Option<f64>,
  pub max_nav: Option<f64>,
  pub sort_by: Option<String>,
  pub ascending: Option<bool>,
  pub limit: Option<usize>,
  pub offset: Option<usize>,
}

impl FundQuery {
  pub fn to_path(&self) -> String {
    let mut query = QueryString::default();
    query.push("category", self.category.as_deref());
    query.push("trustee", self.trustee.as_deref());
    query.push("min_nav", self.min_nav);
    query.push("max_nav", self.max_nav);
    query.push("sort_by", self.sort_by.as_deref());
    query.push("ascending", self.ascending);
    query.push("limit", self.limit);
    query.push("offset", self.offset);
    query.finish("/api/mufap/funds")
  }
}

/// Filters accepted by `/api/psx/stocks`.
#[derive(Debug, Clone, Default)]
pub struct StockQuery {
  pub min_price: Option<f64>,
  pub max_price: Option<f64>,
  pub min_volume: Option<u64>,
  pub sort_by: Option<String>,
  pub ascending: Option<bool>,
  pub limit: Option<usize>,
  pub offset: Option<usize>,
}

impl StockQuery {
  pub fn to_path(&self) -> String {
    let mut query = QueryString::default();
    query.push("min_price", self.min_price);
    query.push("max_price", self.max_price);
    query.push("min_volume", self.min_volume);
    query.push("sort_by", self.sort_by.as_deref());
    query.push("ascending", self.ascending);
    query.push("limit", self.limit);
    query.push("offset", self.offset);
    query.finish("/api/psx/stocks")
  }
}

/// Builds `path?k=v&...`, skipping unset parameters so equal filters
/// always produce the same cache key.
#[derive(Default)]
pub(crate) struct QueryString {
  pairs: Vec<(&'static str, String)>,
}

impl QueryString {
  pub(crate) fn push<V: ToString>(&mut self, key: &'static str, value: Option<V>) {
    if let Some(value) = value {
      self.pairs.push((key, value.to_string()));
    }
  }

  pub(crate) fn finish(self, path: &str) -> String {
    if self.pairs.is_empty() {
      return path.to_string();
    }
    let encoded = url::form_urlencoded::Serializer::new(String::new())
      .extend_pairs(self.pairs.iter().map(|(k, v)| (*k, v.as_str())))
      .finish();
    format!("{}?{}", path, encoded)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn fund_query_skips_unset_filters() {
    assert_eq!(FundQuery::default().to_path(), "/api/mufap/funds");

    let query = FundQuery {
      category: Some("Money Market".to_string()),
      limit: Some(50),
      ..Default::default()
    };
    assert_eq!(
      query.to_path(),
      "/api/mufap/funds?category=Money+Market&limit=50"
    );
  }

  #[test]
  fn psx_envelope_accepts_total_alias() {
    let payload = json!({
      "count": 1,
      "total_filtered": 1,
      "total": 540,
      "offset": 0,
      "limit": 1000,
      "last_scrape": "2025-03-04T10:15:00.123456+05:00",
      "data": [{"symbol": "OGDC", "current": 210.5, "change": 1.5, "change_pct": 0.72, "volume": 120000}]
    });

    let envelope: ListEnvelope<Stock> = serde_json::from_value(payload).unwrap();
    assert_eq!(envelope.total_available, Some(540));
    assert_eq!(envelope.data[0].symbol, "OGDC");
    assert_eq!(
      envelope.last_scrape.map(|t| t.offset().local_minus_utc()),
      Some(5 * 3600)
    );
  }

  #[test]
  fn domain_parses_aliases() {
    assert_eq!("PSX".parse::<Domain>(), Ok(Domain::Psx));
    assert_eq!("funds".parse::<Domain>(), Ok(Domain::Mufap));
    assert!("crypto".parse::<Domain>().is_err());
    assert_eq!(Domain::Mufap.scrape_path(), "/api/mufap/scrape");
  }
}
