//! The merged snapshot of a user, cached in the store with a fixed expiry.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::{
    clock::Clock,
    config::CacheConfig,
    domain::{ItemId, Snapshot, UserId},
    store::{keys, set_json, KeyValueStore},
};

#[derive(Debug, Clone, PartialEq)]
pub struct CachedSnapshot {
    pub snapshot: Snapshot,
    /// When the snapshot was written. Entries written by older versions don't have it.
    pub fetched_at: Option<DateTime<Utc>>,
    /// Items that had more transactions than the snapshot holds
    pub truncated_items: Vec<ItemId>,
}

pub struct SnapshotCache {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
}

impl SnapshotCache {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, config: CacheConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// A partially present or unparseable snapshot counts as a miss, and so does an empty one
    pub async fn read(&self, user: &UserId) -> Result<Option<CachedSnapshot>> {
        let Some(transactions) = self.read_part(&keys::transactions(user)).await? else {
            return Ok(None);
        };
        let Some(accounts) = self.read_part(&keys::accounts(user)).await? else {
            return Ok(None);
        };
        let Some(institutions) = self.read_part(&keys::institutions(user)).await? else {
            return Ok(None);
        };
        let snapshot = Snapshot {
            transactions,
            accounts,
            institutions,
        };
        if !snapshot.is_cacheable() {
            return Ok(None);
        }

        let fetched_at = self.read_part(&keys::fetched_at(user)).await?;
        let truncated_items = self
            .read_part(&keys::truncated_items(user))
            .await?
            .unwrap_or_default();
        Ok(Some(CachedSnapshot {
            snapshot,
            fetched_at,
            truncated_items,
        }))
    }

    /// Returns the write timestamp, or `None` if the snapshot wasn't worth caching
    pub async fn write(
        &self,
        user: &UserId,
        snapshot: &Snapshot,
        truncated_items: &[ItemId],
    ) -> Result<Option<DateTime<Utc>>> {
        if !snapshot.is_cacheable() {
            log::info!("Not caching snapshot without transactions or accounts");
            return Ok(None);
        }

        let ttl = Some(self.config.ttl);
        let store = self.store.as_ref();
        let fetched_at = self.clock.now();
        set_json(store, &keys::transactions(user), &snapshot.transactions, ttl).await?;
        set_json(store, &keys::accounts(user), &snapshot.accounts, ttl).await?;
        set_json(store, &keys::institutions(user), &snapshot.institutions, ttl).await?;
        set_json(store, &keys::fetched_at(user), &fetched_at, ttl).await?;
        if truncated_items.is_empty() {
            store.delete(&keys::truncated_items(user)).await?;
        } else {
            set_json(store, &keys::truncated_items(user), truncated_items, ttl).await?;
        }
        Ok(Some(fetched_at))
    }

    pub async fn invalidate(&self, user: &UserId) -> Result<()> {
        for key in [
            keys::transactions(user),
            keys::accounts(user),
            keys::institutions(user),
            keys::fetched_at(user),
            keys::truncated_items(user),
        ] {
            self.store.delete(&key).await?;
        }
        Ok(())
    }

    async fn read_part<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(value) = self.store.get(key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&value) {
            Ok(parsed) => Ok(Some(parsed)),
            Err(err) => {
                log::warn!("Ignoring corrupt cache entry {key}: {err}");
                Ok(None)
            }
        }
    }
}
