//! Upstream PK Finance API: transport, payload types and the cached client.

mod cached_client;
mod client;
mod error;
#[cfg(test)]
pub(crate) mod testing;
pub mod types;

pub use cached_client::{Fetched, PkFinanceClient};
pub use client::Transport;
pub use error::FetchError;
