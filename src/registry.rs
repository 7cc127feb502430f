//! The linked items of each user, persisted as one JSON list per user.

use anyhow::Result;
use std::sync::Arc;

use crate::{
    aggregator::Aggregator,
    domain::{AccessToken, ItemId, LinkedItem, UserId},
    store::{get_json, keys, set_json, KeyValueStore},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Added,
    /// An item for the same institution existed and was replaced in place
    Replaced,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed(LinkedItem),
    /// The user never linked anything
    UserHasNoItems,
    ItemNotFound,
}

pub struct ItemRegistry {
    store: Arc<dyn KeyValueStore>,
}

impl ItemRegistry {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn list_items(&self, user: &UserId) -> Result<Vec<LinkedItem>> {
        Ok(self.load(user).await?.unwrap_or_default())
    }

    /// Items are unique per institution. Re-linking an institution replaces its previous item.
    pub async fn upsert_item(&self, user: &UserId, item: LinkedItem) -> Result<UpsertOutcome> {
        let mut items = self.list_items(user).await?;
        let outcome = match items
            .iter_mut()
            .find(|existing| existing.institution_id == item.institution_id)
        {
            Some(existing) => {
                *existing = item;
                UpsertOutcome::Replaced
            }
            None => {
                items.push(item);
                UpsertOutcome::Added
            }
        };
        self.save(user, &items).await?;
        Ok(outcome)
    }

    /// Revokes the item's access token at the aggregator and removes it locally.
    ///
    /// Failing to revoke doesn't prevent the local removal, the user asked for the item to disappear.
    pub async fn remove_item(
        &self,
        user: &UserId,
        item_id: &ItemId,
        aggregator: &dyn Aggregator,
    ) -> Result<RemoveOutcome> {
        let Some(mut items) = self.load(user).await? else {
            return Ok(RemoveOutcome::UserHasNoItems);
        };
        let Some(index) = items.iter().position(|item| &item.item_id == item_id) else {
            return Ok(RemoveOutcome::ItemNotFound);
        };

        if let Err(err) = aggregator.remove_item(&items[index].access_token).await {
            log::warn!("Failed to revoke item {item_id} at the aggregator, removing it anyway: {err}");
        }

        let removed = items.remove(index);
        self.save(user, &items).await?;

        if items.is_empty() {
            self.store.delete(&keys::legacy_access_token(user)).await?;
            self.store.delete(&keys::legacy_item_id(user)).await?;
        }

        Ok(RemoveOutcome::Removed(removed))
    }

    pub async fn write_legacy_token(
        &self,
        user: &UserId,
        access_token: &AccessToken,
        item_id: &ItemId,
    ) -> Result<()> {
        self.store
            .set(&keys::legacy_access_token(user), access_token.get().to_string())
            .await?;
        self.store
            .set(&keys::legacy_item_id(user), item_id.to_string())
            .await?;
        Ok(())
    }

    async fn load(&self, user: &UserId) -> Result<Option<Vec<LinkedItem>>> {
        get_json(self.store.as_ref(), &keys::items(user)).await
    }

    async fn save(&self, user: &UserId, items: &[LinkedItem]) -> Result<()> {
        set_json(self.store.as_ref(), &keys::items(user), items, None).await
    }
}
