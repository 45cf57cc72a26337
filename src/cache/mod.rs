//! Client-side response cache for the upstream API.
//!
//! This module provides a stale-while-revalidate caching layer that:
//! - Serves fresh entries without touching the network
//! - Serves stale entries immediately and refreshes them in the background
//! - Collapses concurrent identical GETs into a single request
//! - Falls back to any cached payload when the network fails (offline mode)
//! - Supports invalidation by key substring and full clears

mod inflight;
mod layer;
mod store;
mod traits;

pub use layer::{CacheStats, ResponseCache};
pub use traits::{CachePolicy, CacheSource, CachedResponse};
