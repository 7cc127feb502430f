//! Process-wide keyed store with optional per-entry expiry.
//!
//! Values are opaque strings (the callers put JSON in them). Two backends exist:
//! [InMemoryStore] for tests and development, and [FileStore] which persists all
//! entries into one encrypted file.

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

mod crypto;
mod entries;
mod file;
pub mod keys;
mod memory;

pub use crypto::{Cipher, XChaCha20Poly1305Cipher};
pub use file::FileStore;
pub use memory::InMemoryStore;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns `None` if the key doesn't exist or its entry expired
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a value without expiry, replacing any previous value and expiry
    async fn set(&self, key: &str, value: String) -> Result<()>;

    async fn set_with_expiry(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    /// Deleting a key that doesn't exist is not an error
    async fn delete(&self, key: &str) -> Result<()>;
}

pub async fn get_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>> {
    store
        .get(key)
        .await?
        .map(|value| {
            serde_json::from_str(&value).with_context(|| format!("Failed to parse entry {key}"))
        })
        .transpose()
}

pub async fn set_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) -> Result<()> {
    let value = serde_json::to_string(value)?;
    match ttl {
        Some(ttl) => store.set_with_expiry(key, value, ttl).await,
        None => store.set(key, value).await,
    }
}
