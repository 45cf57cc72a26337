//! Named asset caches: trait, in-memory and SQLite implementations.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Mutex;

use super::AssetResponse;

/// Storage for versioned asset caches, keyed by cache name then URL.
pub trait AssetStore: Send + Sync {
  /// Names of every cache, in name order.
  fn cache_names(&self) -> Result<Vec<String>>;

  fn has_cache(&self, name: &str) -> Result<bool>;

  /// Store a response, creating the cache if needed.
  fn put(&self, cache: &str, url: &str, response: &AssetResponse) -> Result<()>;

  fn lookup(&self, cache: &str, url: &str) -> Result<Option<AssetResponse>>;

  /// Delete a cache and everything in it. Returns false if it did not exist.
  fn delete_cache(&self, name: &str) -> Result<bool>;

  fn entry_count(&self, cache: &str) -> Result<usize>;
}

/// Asset caches that live as long as the process.
#[derive(Default)]
pub struct MemoryAssetStore {
  caches: Mutex<BTreeMap<String, HashMap<String, AssetResponse>>>,
}

impl MemoryAssetStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn caches(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, HashMap<String, AssetResponse>>>> {
    self
      .caches
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))
  }
}

impl AssetStore for MemoryAssetStore {
  fn cache_names(&self) -> Result<Vec<String>> {
    Ok(self.caches()?.keys().cloned().collect())
  }

  fn has_cache(&self, name: &str) -> Result<bool> {
    Ok(self.caches()?.contains_key(name))
  }

  fn put(&self, cache: &str, url: &str, response: &AssetResponse) -> Result<()> {
    self
      .caches()?
      .entry(cache.to_string())
      .or_default()
      .insert(url.to_string(), response.clone());
    Ok(())
  }

  fn lookup(&self, cache: &str, url: &str) -> Result<Option<AssetResponse>> {
    Ok(
      self
        .caches()?
        .get(cache)
        .and_then(|entries| entries.get(url))
        .cloned(),
    )
  }

  fn delete_cache(&self, name: &str) -> Result<bool> {
    Ok(self.caches()?.remove(name).is_some())
  }

  fn entry_count(&self, cache: &str) -> Result<usize> {
    Ok(self.caches()?.get(cache).map_or(0, HashMap::len))
  }
}

/// SQLite-based asset cache storage.
pub struct SqliteAssetStore {
  conn: Mutex<Connection>,
}

impl SqliteAssetStore {
  /// Open the asset database at the default location.
  pub fn open(data_dir: &Path) -> Result<Self> {
    // Ensure parent directory exists
    std::fs::create_dir_all(data_dir)
      .map_err(|e| eyre!("Failed to create data directory: {}", e))?;

    Self::open_at(&data_dir.join("shell.db"))
  }

  pub fn open_at(path: &Path) -> Result<Self> {
    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open shell database at {}: {}", path.display(), e))?;
    Self::with_connection(conn)
  }

  #[cfg(test)]
  pub fn in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory shell database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Run database migrations for the asset tables.
  fn run_migrations(&self) -> Result<()> {
    self
      .conn()?
      .execute_batch(SHELL_SCHEMA)
      .map_err(|e| eyre!("Failed to run shell migrations: {}", e))?;
    Ok(())
  }

  fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))
  }
}

/// Schema for asset cache tables.
const SHELL_SCHEMA: &str = r#"
-- One row per named cache
CREATE TABLE IF NOT EXISTS asset_caches (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Stored responses
CREATE TABLE IF NOT EXISTS asset_entries (
    cache_name TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    content_type TEXT,
    body BLOB NOT NULL,
    stored_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (cache_name, url)
);
"#;

impl AssetStore for SqliteAssetStore {
  fn cache_names(&self) -> Result<Vec<String>> {
    let conn = self.conn()?;
    let mut stmt = conn
      .prepare("SELECT name FROM asset_caches ORDER BY name")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let names = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list caches: {}", e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to read cache name: {}", e))?;

    Ok(names)
  }

  fn has_cache(&self, name: &str) -> Result<bool> {
    let conn = self.conn()?;
    let found: Option<i64> = conn
      .query_row(
        "SELECT 1 FROM asset_caches WHERE name = ?",
        params![name],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to look up cache {}: {}", name, e))?;
    Ok(found.is_some())
  }

  fn put(&self, cache: &str, url: &str, response: &AssetResponse) -> Result<()> {
    let mut conn = self.conn()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute(
      "INSERT OR IGNORE INTO asset_caches (name) VALUES (?)",
      params![cache],
    )
    .map_err(|e| eyre!("Failed to create cache {}: {}", cache, e))?;

    tx.execute(
      "INSERT OR REPLACE INTO asset_entries (cache_name, url, status, content_type, body, stored_at)
       VALUES (?, ?, ?, ?, ?, datetime('now'))",
      params![
        cache,
        url,
        response.status,
        response.content_type,
        response.body
      ],
    )
    .map_err(|e| eyre!("Failed to store asset {}: {}", url, e))?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;
    Ok(())
  }

  fn lookup(&self, cache: &str, url: &str) -> Result<Option<AssetResponse>> {
    let conn = self.conn()?;
    conn
      .query_row(
        "SELECT status, content_type, body FROM asset_entries WHERE cache_name = ? AND url = ?",
        params![cache, url],
        |row| {
          Ok(AssetResponse {
            status: row.get(0)?,
            kind: super::ResponseKind::Basic,
            content_type: row.get(1)?,
            body: row.get(2)?,
          })
        },
      )
      .optional()
      .map_err(|e| eyre!("Failed to look up asset {}: {}", url, e))
  }

  fn delete_cache(&self, name: &str) -> Result<bool> {
    let mut conn = self.conn()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute(
      "DELETE FROM asset_entries WHERE cache_name = ?",
      params![name],
    )
    .map_err(|e| eyre!("Failed to delete assets of {}: {}", name, e))?;
    let removed = tx
      .execute("DELETE FROM asset_caches WHERE name = ?", params![name])
      .map_err(|e| eyre!("Failed to delete cache {}: {}", name, e))?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;
    Ok(removed > 0)
  }

  fn entry_count(&self, cache: &str) -> Result<usize> {
    let conn = self.conn()?;
    let count: i64 = conn
      .query_row(
        "SELECT COUNT(*) FROM asset_entries WHERE cache_name = ?",
        params![cache],
        |row| row.get(0),
      )
      .map_err(|e| eyre!("Failed to count assets of {}: {}", cache, e))?;
    Ok(count as usize)
  }
}
