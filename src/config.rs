use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::CachePolicy;

/// Default upstream API.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub api: ApiConfig,
  pub cache: CacheConfig,
  pub shell: ShellConfig,
  pub dashboard: DashboardConfig,
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
  pub base_url: String,
  /// Per-request timeout
  pub timeout_secs: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: DEFAULT_BASE_URL.to_string(),
      timeout_secs: 30,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Entries younger than this are served without a request
  pub fresh_ttl_ms: u64,
  /// Entries younger than this are served while refreshing in the background
  pub stale_ttl_ms: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    let policy = CachePolicy::default();
    Self {
      fresh_ttl_ms: policy.fresh_ttl.as_millis() as u64,
      stale_ttl_ms: policy.stale_ttl.as_millis() as u64,
    }
  }
}

impl CacheConfig {
  pub fn policy(&self) -> CachePolicy {
    CachePolicy {
      fresh_ttl: Duration::from_millis(self.fresh_ttl_ms),
      stale_ttl: Duration::from_millis(self.stale_ttl_ms),
    }
  }

  fn validate(&self) -> Result<()> {
    if self.stale_ttl_ms < self.fresh_ttl_ms {
      return Err(eyre!(
        "cache.stale_ttl_ms ({}) must not be shorter than cache.fresh_ttl_ms ({})",
        self.stale_ttl_ms,
        self.fresh_ttl_ms
      ));
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ShellStorage {
  /// Asset caches live only as long as the process
  Memory,
  /// Asset caches persist in a SQLite file in the data directory
  #[default]
  Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
  /// Origin the shell assets are served from (defaults to the API base URL)
  pub origin: Option<String>,
  pub cache_prefix: String,
  /// Literal version tag, or "manifest-hash" to derive one from the manifest
  pub version: String,
  /// Requests under this path always go to the network
  pub api_prefix: String,
  /// Send every cross-origin request straight to the network
  pub bypass_cross_origin: bool,
  /// Activate a freshly installed shell without waiting for clients to close
  pub skip_waiting: bool,
  pub manifest: Vec<String>,
  pub storage: ShellStorage,
}

impl Default for ShellConfig {
  fn default() -> Self {
    Self {
      origin: None,
      cache_prefix: "pkfinance".to_string(),
      version: "v3".to_string(),
      api_prefix: "/api/".to_string(),
      bypass_cross_origin: true,
      skip_waiting: true,
      manifest: vec![
        "/".to_string(),
        "/index.html".to_string(),
        "/manifest.json".to_string(),
        "/favicon.ico".to_string(),
      ],
      storage: ShellStorage::default(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
  /// Reload the visible view this often
  pub refresh_secs: u64,
  /// Rows requested for ranking lists
  pub list_limit: usize,
}

impl Default for DashboardConfig {
  fn default() -> Self {
    Self {
      refresh_secs: 60,
      list_limit: 20,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
  /// Default filter directive, overridden by RUST_LOG
  pub level: String,
  /// Log directory (defaults to the data directory)
  pub directory: Option<PathBuf>,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
      directory: None,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./pkfin.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/pkfin/config.yaml
  ///
  /// Without any file the defaults are used. `PKFIN_BASE_URL` overrides the
  /// API base URL in every case.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };

    if let Some(base_url) = Self::base_url_override() {
      config.api.base_url = base_url;
    }

    config.cache.validate()?;
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("pkfin.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("pkfin").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    // An empty file deserializes to null, treat it as all defaults.
    if contents.trim().is_empty() {
      return Ok(Config::default());
    }
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  /// Get the API base URL override from the environment.
  pub fn base_url_override() -> Option<String> {
    std::env::var("PKFIN_BASE_URL")
      .ok()
      .filter(|v| !v.trim().is_empty())
  }

  /// Directory for logs and the shell asset database.
  pub fn data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("pkfin"))
  }

  /// Origin the offline shell fetches its assets from.
  pub fn shell_origin(&self) -> &str {
    self.shell.origin.as_deref().unwrap_or(&self.api.base_url)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_file_uses_defaults() {
    let config = Config::from_yaml("").unwrap();
    assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
    assert_eq!(config.cache.policy(), CachePolicy::default());
    assert_eq!(config.shell.storage, ShellStorage::Sqlite);
    assert_eq!(config.dashboard.refresh_secs, 60);
  }

  #[test]
  fn partial_sections_keep_other_defaults() {
    let config = Config::from_yaml(
      r#"
api:
  base_url: http://10.0.0.5:8000
cache:
  fresh_ttl_ms: 5000
shell:
  version: v7
  storage: memory
  manifest: ["/", "/app.js"]
"#,
    )
    .unwrap();

    assert_eq!(config.api.base_url, "http://10.0.0.5:8000");
    assert_eq!(config.api.timeout_secs, 30);
    assert_eq!(config.cache.fresh_ttl_ms, 5000);
    assert_eq!(config.cache.stale_ttl_ms, 600_000);
    assert_eq!(config.shell.version, "v7");
    assert_eq!(config.shell.storage, ShellStorage::Memory);
    assert_eq!(config.shell.manifest, vec!["/", "/app.js"]);
    assert_eq!(config.shell_origin(), "http://10.0.0.5:8000");
  }

  #[test]
  fn inverted_ttls_are_rejected() {
    let config = Config::from_yaml("cache: { fresh_ttl_ms: 10, stale_ttl_ms: 5 }").unwrap();
    assert!(config.cache.validate().is_err());
  }

  #[test]
  fn unknown_storage_is_an_error() {
    assert!(Config::from_yaml("shell: { storage: redis }").is_err());
  }
}
