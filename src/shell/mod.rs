//! Offline application shell.
//!
//! A versioned set of static assets is installed into a named cache up
//! front. Once active, the shell answers static requests cache-first,
//! sends API calls and mutations straight to the network and serves the
//! cached root document to navigations that fail while offline.

mod fetcher;
mod lifecycle;
mod manifest;
mod routing;
mod storage;

use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::config::{Config, ShellStorage};

pub use fetcher::{AssetFetcher, HttpAssetFetcher};
pub use lifecycle::{RegisterOutcome, ShellRegistration, ShellWorker};
pub use manifest::{CacheVersion, ShellManifest};
pub use routing::{RequestMode, RoutePolicy, ShellRequest};
pub use storage::{AssetStore, MemoryAssetStore, SqliteAssetStore};

/// How a response relates to the page that requested it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
  /// Same-origin
  Basic,
  /// Cross-origin, readable
  Cors,
  /// Cross-origin, unreadable
  Opaque,
}

/// A stored or fetched asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetResponse {
  pub status: u16,
  pub kind: ResponseKind,
  pub content_type: Option<String>,
  pub body: Vec<u8>,
}

impl AssetResponse {
  pub fn is_ok(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
  Cache,
  Network,
  /// Cached root document served to a navigation that failed offline
  OfflineFallback,
}

#[derive(Debug, Clone)]
pub struct ShellResponse {
  pub response: AssetResponse,
  pub served_from: ServedFrom,
}

/// Everything needed to build one shell version.
#[derive(Debug, Clone)]
pub struct ShellOptions {
  pub cache_prefix: String,
  pub version: CacheVersion,
  pub manifest: ShellManifest,
  pub routes: RoutePolicy,
  pub skip_waiting: bool,
}

impl ShellOptions {
  pub fn from_config(config: &Config) -> Result<Self> {
    let shell = &config.shell;
    let origin = shell_origin(config)?;

    Ok(Self {
      cache_prefix: shell.cache_prefix.clone(),
      version: CacheVersion::parse(&shell.version),
      manifest: ShellManifest::new(shell.manifest.iter().cloned()),
      routes: RoutePolicy {
        origin,
        api_prefix: shell.api_prefix.clone(),
        bypass_cross_origin: shell.bypass_cross_origin,
      },
      skip_waiting: shell.skip_waiting,
    })
  }
}

fn shell_origin(config: &Config) -> Result<Url> {
  let raw = config.shell_origin();
  Url::parse(raw).map_err(|e| eyre!("Invalid shell origin {}: {}", raw, e))
}

/// Open the configured asset store.
pub fn open_store(config: &Config) -> Result<Arc<dyn AssetStore>> {
  Ok(match config.shell.storage {
    ShellStorage::Memory => Arc::new(MemoryAssetStore::new()),
    ShellStorage::Sqlite => Arc::new(SqliteAssetStore::open(&Config::data_dir()?)?),
  })
}

/// Build a worker for the configured shell version.
pub fn configured_worker(config: &Config, store: Arc<dyn AssetStore>) -> Result<ShellWorker> {
  let options = ShellOptions::from_config(config)?;
  let fetcher = configured_fetcher(config, &options)?;
  Ok(ShellWorker::new(options, store, fetcher))
}

/// Rebuild the registration earlier runs left in `store`, along with the
/// caches deleted if the configured version took over while loading.
pub fn load_registration(
  config: &Config,
  store: Arc<dyn AssetStore>,
) -> Result<(ShellRegistration, Vec<String>)> {
  let options = ShellOptions::from_config(config)?;
  let fetcher = configured_fetcher(config, &options)?;
  ShellRegistration::load(options, store, fetcher)
}

fn configured_fetcher(config: &Config, options: &ShellOptions) -> Result<Arc<dyn AssetFetcher>> {
  Ok(Arc::new(HttpAssetFetcher::new(
    &options.routes.origin,
    Duration::from_secs(config.api.timeout_secs),
  )?))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn options_follow_config() {
    let config = Config::from_yaml(
      r#"
api:
  base_url: http://10.0.0.5:8000
shell:
  version: manifest-hash
  manifest: ["/", "/index.html"]
"#,
    )
    .unwrap();

    let options = ShellOptions::from_config(&config).unwrap();
    assert_eq!(options.version, CacheVersion::ManifestHash);
    assert_eq!(options.routes.origin.as_str(), "http://10.0.0.5:8000/");
    assert!(options.skip_waiting);
    let name = options.manifest.cache_name(&options.cache_prefix, &options.version);
    assert!(name.starts_with("pkfinance-"));
    assert_eq!(name.len(), "pkfinance-".len() + 12);
  }

  #[test]
  fn bad_origin_is_reported() {
    let config = Config::from_yaml("shell: { origin: 'not a url' }").unwrap();
    assert!(ShellOptions::from_config(&config).is_err());
  }
}
