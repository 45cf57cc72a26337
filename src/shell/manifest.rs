//! Shell asset manifest and cache versioning.

use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Version keyword that derives the tag from the manifest contents.
pub const MANIFEST_HASH: &str = "manifest-hash";

/// How the asset cache name is versioned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheVersion {
  /// A literal tag that must be bumped by hand whenever the manifest changes
  Manual(String),
  /// Derived from the manifest, changes whenever the asset list does
  ManifestHash,
}

impl CacheVersion {
  pub fn parse(raw: &str) -> Self {
    match raw.trim() {
      MANIFEST_HASH => CacheVersion::ManifestHash,
      other => CacheVersion::Manual(other.to_string()),
    }
  }
}

/// The fixed list of shell files installed up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellManifest {
  assets: Vec<String>,
}

impl ShellManifest {
  pub fn new<I, S>(assets: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    // Listing order is kept, repeats are dropped
    let mut seen = HashSet::new();
    let assets = assets
      .into_iter()
      .map(Into::into)
      .filter(|asset: &String| seen.insert(asset.clone()))
      .collect();
    Self { assets }
  }

  pub fn assets(&self) -> &[String] {
    &self.assets
  }

  /// Stable short hash of the asset list, independent of listing order.
  pub fn digest(&self) -> String {
    let mut sorted: Vec<&str> = self.assets.iter().map(String::as_str).collect();
    sorted.sort_unstable();

    let mut hasher = Sha256::new();
    for asset in sorted {
      hasher.update(asset.as_bytes());
      hasher.update(b"\n");
    }
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(12);
    digest
  }

  /// Name of the asset cache for this manifest: `"{prefix}-{version}"`.
  pub fn cache_name(&self, prefix: &str, version: &CacheVersion) -> String {
    match version {
      CacheVersion::Manual(tag) => format!("{}-{}", prefix, tag),
      CacheVersion::ManifestHash => format!("{}-{}", prefix, self.digest()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn manual_versions_are_used_verbatim() {
    let manifest = ShellManifest::new(["/", "/index.html"]);
    assert_eq!(
      manifest.cache_name("pkfinance", &CacheVersion::parse("v3")),
      "pkfinance-v3"
    );
  }

  #[test]
  fn repeated_assets_are_listed_once() {
    let repeated = ShellManifest::new(["/", "/app.js", "/", "/app.js"]);
    let unique = ShellManifest::new(["/", "/app.js"]);

    assert_eq!(repeated.assets(), &["/".to_string(), "/app.js".to_string()]);
    assert_eq!(repeated.digest(), unique.digest());
  }

  #[test]
  fn manifest_hash_tracks_contents_not_order() {
    let a = ShellManifest::new(["/", "/index.html", "/app.js"]);
    let b = ShellManifest::new(["/app.js", "/", "/index.html"]);
    let c = ShellManifest::new(["/", "/index.html", "/app.v2.js"]);

    let version = CacheVersion::parse(MANIFEST_HASH);
    assert_eq!(a.cache_name("pk", &version), b.cache_name("pk", &version));
    assert_ne!(a.cache_name("pk", &version), c.cache_name("pk", &version));
    assert_eq!(a.digest().len(), 12);
  }
}
