//! Install/activate/fetch lifecycle of the offline shell.

use color_eyre::{eyre::eyre, Result};
use futures::future::try_join_all;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use super::fetcher::AssetFetcher;
use super::manifest::ShellManifest;
use super::routing::{RequestMode, Route, RoutePolicy, ShellRequest};
use super::storage::AssetStore;
use super::{AssetResponse, ResponseKind, ServedFrom, ShellOptions, ShellResponse};
use crate::api::FetchError;

/// Documents served when a navigation fails offline, in lookup order.
const OFFLINE_DOCUMENTS: &[&str] = &["/", "/index.html"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellState {
  Uninstalled,
  Installing,
  /// Installed and waiting for the previous version to let go
  Installed,
  Activating,
  Active,
  /// Replaced by a newer version
  Redundant,
}

impl fmt::Display for ShellState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let label = match self {
      ShellState::Uninstalled => "uninstalled",
      ShellState::Installing => "installing",
      ShellState::Installed => "installed (waiting)",
      ShellState::Activating => "activating",
      ShellState::Active => "active",
      ShellState::Redundant => "redundant",
    };
    f.write_str(label)
  }
}

/// One version of the offline shell.
pub struct ShellWorker {
  cache_name: String,
  manifest: ShellManifest,
  routes: RoutePolicy,
  skip_waiting: bool,
  state: ShellState,
  claimed: bool,
  store: Arc<dyn AssetStore>,
  fetcher: Arc<dyn AssetFetcher>,
}

impl ShellWorker {
  pub fn new(
    options: ShellOptions,
    store: Arc<dyn AssetStore>,
    fetcher: Arc<dyn AssetFetcher>,
  ) -> Self {
    let cache_name = options
      .manifest
      .cache_name(&options.cache_prefix, &options.version);
    Self {
      cache_name,
      manifest: options.manifest,
      routes: options.routes,
      skip_waiting: options.skip_waiting,
      state: ShellState::Uninstalled,
      claimed: false,
      store,
      fetcher,
    }
  }

  pub fn cache_name(&self) -> &str {
    &self.cache_name
  }

  pub fn state(&self) -> ShellState {
    self.state
  }

  /// Whether this worker has taken control of open clients.
  pub fn is_controlling(&self) -> bool {
    self.claimed
  }

  /// Fetch every manifest asset and store it in this version's cache.
  ///
  /// Either every asset is fetched successfully or nothing is written and
  /// the worker goes back to `Uninstalled`.
  pub async fn install(&mut self) -> Result<usize> {
    if self.state != ShellState::Uninstalled {
      return Err(eyre!("Cannot install shell in state {}", self.state));
    }
    self.state = ShellState::Installing;
    info!(cache = %self.cache_name, assets = self.manifest.assets().len(), "installing shell");

    let existed = self.store.has_cache(&self.cache_name)?;
    match self.precache().await {
      Ok(count) => {
        self.state = ShellState::Installed;
        Ok(count)
      }
      Err(err) => {
        self.state = ShellState::Uninstalled;
        if !existed {
          if let Err(cleanup) = self.store.delete_cache(&self.cache_name) {
            warn!(cache = %self.cache_name, error = %cleanup, "failed to remove partial shell cache");
          }
        }
        Err(err)
      }
    }
  }

  async fn precache(&self) -> Result<usize> {
    let urls = self
      .manifest
      .assets()
      .iter()
      .map(|path| self.asset_url(path))
      .collect::<Result<Vec<_>>>()?;

    let fetched = try_join_all(urls.iter().map(|url| {
      let request = self.fetcher.fetch(reqwest::Method::GET, url);
      async move {
        let response = request
          .await
          .map_err(|e| eyre!("Failed to fetch shell asset {}: {}", url, e))?;
        if !response.is_ok() {
          return Err(eyre!(
            "Shell asset {} returned HTTP {}",
            url,
            response.status
          ));
        }
        Ok::<_, color_eyre::Report>(response)
      }
    }))
    .await?;

    for (url, response) in urls.iter().zip(&fetched) {
      self.store.put(&self.cache_name, url.as_str(), response)?;
    }
    Ok(fetched.len())
  }

  /// Delete every cache that does not belong to this version, then claim
  /// open clients. Returns the names of the deleted caches.
  pub fn activate(&mut self) -> Result<Vec<String>> {
    if self.state != ShellState::Installed {
      return Err(eyre!("Cannot activate shell in state {}", self.state));
    }
    self.state = ShellState::Activating;

    let deleted = match self.purge_old_caches() {
      Ok(deleted) => deleted,
      Err(err) => {
        self.state = ShellState::Installed;
        return Err(err);
      }
    };

    self.claimed = true;
    self.state = ShellState::Active;
    info!(cache = %self.cache_name, ?deleted, "shell activated");
    Ok(deleted)
  }

  fn purge_old_caches(&self) -> Result<Vec<String>> {
    let mut deleted = Vec::new();
    for name in self.store.cache_names()? {
      if name != self.cache_name && self.store.delete_cache(&name)? {
        debug!(cache = %name, "deleted outdated shell cache");
        deleted.push(name);
      }
    }
    Ok(deleted)
  }

  /// Pick up a version installed by an earlier run. The worker ends up
  /// `Installed`; nothing is fetched or purged.
  fn resume(&mut self) -> Result<bool> {
    if self.state != ShellState::Uninstalled {
      return Ok(self.state == ShellState::Installed);
    }
    if self.store.entry_count(&self.cache_name)? == 0 {
      return Ok(false);
    }
    self.state = ShellState::Installed;
    Ok(true)
  }

  /// Take back control an earlier run already had.
  fn resume_control(&mut self) {
    self.state = ShellState::Active;
    self.claimed = true;
  }

  /// Retire a version that will never take control and drop its cache.
  fn discard(&mut self) -> Result<()> {
    self.retire();
    if self.store.delete_cache(&self.cache_name)? {
      debug!(cache = %self.cache_name, "deleted superseded waiting shell cache");
    }
    Ok(())
  }

  fn retire(&mut self) {
    self.state = ShellState::Redundant;
    self.claimed = false;
  }

  /// Serve an intercepted request.
  pub async fn handle_fetch(&self, request: &ShellRequest) -> Result<ShellResponse, FetchError> {
    if self.state != ShellState::Active {
      return self.from_network(request).await;
    }

    match self.routes.route(request) {
      Route::NetworkOnly => self.from_network(request).await,
      Route::CacheFirst => self.cache_first(request).await,
    }
  }

  async fn cache_first(&self, request: &ShellRequest) -> Result<ShellResponse, FetchError> {
    match self.store.lookup(&self.cache_name, request.url.as_str()) {
      Ok(Some(response)) => {
        debug!(url = %request.url, "shell cache hit");
        return Ok(ShellResponse {
          response,
          served_from: ServedFrom::Cache,
        });
      }
      Ok(None) => {}
      Err(err) => warn!(url = %request.url, error = %err, "shell cache lookup failed"),
    }

    match self.fetcher.fetch(request.method.clone(), &request.url).await {
      Ok(response) => {
        if response.is_ok() && response.kind == ResponseKind::Basic {
          if let Err(err) = self.store.put(&self.cache_name, request.url.as_str(), &response) {
            warn!(url = %request.url, error = %err, "failed to store shell asset");
          }
        }
        Ok(ShellResponse {
          response,
          served_from: ServedFrom::Network,
        })
      }
      Err(err) if request.mode == RequestMode::Navigate => match self.offline_document() {
        Some(response) => {
          warn!(url = %request.url, error = %err, "offline, serving cached shell");
          Ok(ShellResponse {
            response,
            served_from: ServedFrom::OfflineFallback,
          })
        }
        None => Err(err),
      },
      Err(err) => Err(err),
    }
  }

  fn offline_document(&self) -> Option<AssetResponse> {
    OFFLINE_DOCUMENTS.iter().find_map(|path| {
      let url = self.asset_url(path).ok()?;
      self
        .store
        .lookup(&self.cache_name, url.as_str())
        .ok()
        .flatten()
    })
  }

  async fn from_network(&self, request: &ShellRequest) -> Result<ShellResponse, FetchError> {
    let response = self
      .fetcher
      .fetch(request.method.clone(), &request.url)
      .await?;
    Ok(ShellResponse {
      response,
      served_from: ServedFrom::Network,
    })
  }

  fn asset_url(&self, path: &str) -> Result<Url> {
    self
      .routes
      .origin
      .join(path)
      .map_err(|e| eyre!("Invalid shell asset path {}: {}", path, e))
  }
}

/// What happened when a worker was registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
  /// The same version is already installed
  Unchanged,
  /// The new version took over, deleting the listed caches
  Activated { deleted: Vec<String> },
  /// Installed, but waiting for the current version's clients to close
  Waiting,
}

/// Tracks the active and waiting shell versions.
pub struct ShellRegistration {
  active: Option<ShellWorker>,
  waiting: Option<ShellWorker>,
  fetcher: Arc<dyn AssetFetcher>,
}

impl ShellRegistration {
  pub fn new(fetcher: Arc<dyn AssetFetcher>) -> Self {
    Self {
      active: None,
      waiting: None,
      fetcher,
    }
  }

  pub fn active(&self) -> Option<&ShellWorker> {
    self.active.as_ref()
  }

  pub fn waiting(&self) -> Option<&ShellWorker> {
    self.waiting.as_ref()
  }

  /// Rebuild the registration earlier runs left in `store`.
  ///
  /// An installed cache other than the configured one is still in control;
  /// an installed configured version waits behind it, or takes over at once
  /// when it skips waiting. Returns the registration and the names deleted
  /// by such a takeover.
  pub fn load(
    options: ShellOptions,
    store: Arc<dyn AssetStore>,
    fetcher: Arc<dyn AssetFetcher>,
  ) -> Result<(Self, Vec<String>)> {
    let mut registration = Self::new(fetcher.clone());
    let mut current = ShellWorker::new(options.clone(), store.clone(), fetcher.clone());
    let current_installed = current.resume()?;

    for name in store.cache_names()? {
      if name == current.cache_name {
        continue;
      }
      let mut previous = ShellWorker::new(options.clone(), store.clone(), fetcher.clone());
      previous.cache_name = name;
      if previous.resume()? {
        previous.resume_control();
        registration.active = Some(previous);
        break;
      }
    }

    let mut deleted = Vec::new();
    if current_installed {
      if registration.active.is_none() {
        current.resume_control();
        registration.active = Some(current);
      } else if current.skip_waiting {
        deleted = registration.promote(current)?;
      } else {
        registration.waiting = Some(current);
      }
    }
    Ok((registration, deleted))
  }

  /// Install `worker` and activate it if nothing is in control or it asked
  /// to skip waiting.
  pub async fn register(&mut self, mut worker: ShellWorker) -> Result<RegisterOutcome> {
    let already_known = [self.active.as_ref(), self.waiting.as_ref()]
      .into_iter()
      .flatten()
      .any(|w| w.cache_name == worker.cache_name);
    if already_known {
      debug!(cache = %worker.cache_name, "shell version already registered");
      return Ok(RegisterOutcome::Unchanged);
    }

    worker.install().await?;

    if worker.skip_waiting || self.active.is_none() {
      let deleted = self.promote(worker)?;
      Ok(RegisterOutcome::Activated { deleted })
    } else {
      info!(cache = %worker.cache_name, "shell installed, waiting for clients to close");
      if let Some(mut previous) = self.waiting.replace(worker) {
        previous.discard()?;
      }
      Ok(RegisterOutcome::Waiting)
    }
  }

  /// All clients of the current version went away: activate the waiting one.
  pub fn release_clients(&mut self) -> Result<Option<Vec<String>>> {
    match self.waiting.take() {
      Some(worker) => self.promote(worker).map(Some),
      None => Ok(None),
    }
  }

  fn promote(&mut self, mut worker: ShellWorker) -> Result<Vec<String>> {
    let deleted = worker.activate()?;
    // Its cache is gone with the rest of the older versions
    if let Some(mut superseded) = self.waiting.take() {
      superseded.retire();
    }
    if let Some(mut old) = self.active.replace(worker) {
      old.retire();
    }
    Ok(deleted)
  }

  /// Route a request through the controlling worker, if any.
  pub async fn handle_fetch(&self, request: &ShellRequest) -> Result<ShellResponse, FetchError> {
    match &self.active {
      Some(worker) => worker.handle_fetch(request).await,
      None => {
        let response = self
          .fetcher
          .fetch(request.method.clone(), &request.url)
          .await?;
        Ok(ShellResponse {
          response,
          served_from: ServedFrom::Network,
        })
      }
    }
  }
}
