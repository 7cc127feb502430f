//! The request-level operations of the dashboard backend.

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

use crate::{
    aggregator::{
        Aggregator, AggregatorError, ErrorKind, LinkSettings, INVALID_ACCESS_TOKEN,
        ITEM_LOGIN_REQUIRED,
    },
    clock::Clock,
    config::SyncConfig,
    domain::{
        ItemId, LinkToken, LinkedItem, LinkedItemSummary, PublicToken, Snapshot, UserId,
    },
    registry::{ItemRegistry, RemoveOutcome, UpsertOutcome},
    snapshot_cache::SnapshotCache,
    sync::{self, ItemFailure},
};

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("User has no linked items")]
    NotLinked,

    #[error("Item not found")]
    ItemNotFound,

    #[error("Bank connection needs to be re-authenticated")]
    ReauthRequired,

    #[error("Bank connection has an invalid access token")]
    InvalidToken,

    #[error(transparent)]
    Aggregator(#[from] AggregatorError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl DashboardError {
    /// Machine readable code for errors the client can act on
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            DashboardError::ReauthRequired => Some(ITEM_LOGIN_REQUIRED),
            DashboardError::InvalidToken => Some(INVALID_ACCESS_TOKEN),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkedInstitution {
    pub institution_name: String,
    /// Number of accounts the new item has
    pub accounts: usize,
    pub outcome: UpsertOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchedSnapshot {
    pub snapshot: Snapshot,
    pub fetched_at: Option<DateTime<Utc>>,
    pub from_cache: bool,
    /// Items that failed and are missing from the snapshot
    pub item_errors: Vec<ItemFailure>,
    /// Items cut off at the per-item transaction cap, the snapshot is incomplete for them
    pub truncated_items: Vec<ItemId>,
}

pub struct Dashboard {
    aggregator: Arc<dyn Aggregator>,
    registry: ItemRegistry,
    cache: SnapshotCache,
    clock: Arc<dyn Clock>,
    sync_config: SyncConfig,
    link_settings: LinkSettings,
}

impl Dashboard {
    pub fn new(
        aggregator: Arc<dyn Aggregator>,
        registry: ItemRegistry,
        cache: SnapshotCache,
        clock: Arc<dyn Clock>,
        sync_config: SyncConfig,
        link_settings: LinkSettings,
    ) -> Self {
        Self {
            aggregator,
            registry,
            cache,
            clock,
            sync_config,
            link_settings,
        }
    }

    pub async fn create_link_token(&self, user: &UserId) -> Result<LinkToken, DashboardError> {
        let link_token = self
            .aggregator
            .create_link_token(user, &self.link_settings)
            .await?;
        Ok(link_token)
    }

    /// Turn the public token from the link widget into a linked item
    pub async fn exchange_public_token(
        &self,
        user: &UserId,
        public_token: &PublicToken,
    ) -> Result<LinkedInstitution, DashboardError> {
        let exchanged = self.aggregator.exchange_public_token(public_token).await?;
        let item = self.aggregator.get_item(&exchanged.access_token).await?;
        let institution_id = item.institution_id.ok_or_else(|| {
            anyhow!("Item {} doesn't report an institution", exchanged.item_id)
        })?;
        let institution = self.aggregator.get_institution(&institution_id).await?;
        let accounts = self.aggregator.get_accounts(&exchanged.access_token).await?;

        let linked_item = LinkedItem {
            item_id: exchanged.item_id,
            access_token: exchanged.access_token,
            institution_id: institution.institution_id,
            institution_name: institution.name,
            date_connected: self.clock.now(),
        };
        let institution_name = linked_item.institution_name.clone();
        let (access_token, item_id) = (linked_item.access_token.clone(), linked_item.item_id.clone());

        let outcome = self.registry.upsert_item(user, linked_item).await?;
        match outcome {
            UpsertOutcome::Added => log::info!("Linked new item {item_id} at {institution_name}"),
            UpsertOutcome::Replaced => {
                log::info!("Re-linked {institution_name}, replaced previous item with {item_id}")
            }
        }
        self.registry
            .write_legacy_token(user, &access_token, &item_id)
            .await?;
        self.cache.invalidate(user).await?;

        Ok(LinkedInstitution {
            institution_name,
            accounts: accounts.len(),
            outcome,
        })
    }

    /// Cached snapshot if there is one, otherwise sync all items of the user.
    ///
    /// Single failing items don't fail the request, they're reported in
    /// [FetchedSnapshot::item_errors]. Only if every item failed and one of them needs the
    /// user to re-link, that's reported as an error.
    pub async fn fetch_snapshot(
        &self,
        user: &UserId,
        bypass_cache: bool,
    ) -> Result<FetchedSnapshot, DashboardError> {
        if !bypass_cache {
            if let Some(cached) = self.cache.read(user).await? {
                log::info!("Serving cached snapshot");
                return Ok(FetchedSnapshot {
                    snapshot: cached.snapshot,
                    fetched_at: cached.fetched_at,
                    from_cache: true,
                    item_errors: vec![],
                    truncated_items: cached.truncated_items,
                });
            }
        }

        let items = self.registry.list_items(user).await?;
        if items.is_empty() {
            return Err(DashboardError::NotLinked);
        }

        let outcome = sync::sync_items(self.aggregator.as_ref(), &items, &self.sync_config).await;
        if outcome.all_items_failed() {
            if let Some(auth_failure) = outcome.failures.iter().find(|failure| failure.kind.is_auth()) {
                return Err(match auth_failure.kind {
                    ErrorKind::ReauthRequired => DashboardError::ReauthRequired,
                    _ => DashboardError::InvalidToken,
                });
            }
        }

        let fetched_at = self
            .cache
            .write(user, &outcome.snapshot, &outcome.truncated_items)
            .await?;
        Ok(FetchedSnapshot {
            snapshot: outcome.snapshot,
            fetched_at,
            from_cache: false,
            item_errors: outcome.failures,
            truncated_items: outcome.truncated_items,
        })
    }

    pub async fn remove_item(&self, user: &UserId, item_id: &ItemId) -> Result<(), DashboardError> {
        match self
            .registry
            .remove_item(user, item_id, self.aggregator.as_ref())
            .await?
        {
            RemoveOutcome::Removed(item) => {
                log::info!("Removed item {} ({})", item.item_id, item.institution_name);
                self.cache.invalidate(user).await?;
                Ok(())
            }
            RemoveOutcome::UserHasNoItems => Err(DashboardError::NotLinked),
            RemoveOutcome::ItemNotFound => Err(DashboardError::ItemNotFound),
        }
    }

    pub async fn list_items(&self, user: &UserId) -> Result<Vec<LinkedItemSummary>, DashboardError> {
        let items = self.registry.list_items(user).await?;
        Ok(items.iter().map(LinkedItem::summary).collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::{
        clock::ManualClock,
        config::CacheConfig,
        domain::InstitutionId,
        store::{keys, InMemoryStore, KeyValueStore},
        testutils::{account, linked_item, transactions, user, FakeAggregator, ScriptedPage},
    };

    struct Fixture {
        dashboard: Dashboard,
        aggregator: Arc<FakeAggregator>,
        store: Arc<InMemoryStore>,
        clock: Arc<ManualClock>,
    }

    fn fixture(aggregator: FakeAggregator) -> Fixture {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
        ));
        let store = Arc::new(InMemoryStore::with_clock(clock.clone()));
        let aggregator = Arc::new(aggregator);
        let dashboard = Dashboard::new(
            aggregator.clone(),
            ItemRegistry::new(store.clone()),
            SnapshotCache::new(store.clone(), clock.clone(), CacheConfig::default()),
            clock.clone(),
            SyncConfig::default(),
            LinkSettings::default(),
        );
        Fixture {
            dashboard,
            aggregator,
            store,
            clock,
        }
    }

    impl Fixture {
        async fn link(&self, user: &UserId, item: LinkedItem) {
            ItemRegistry::new(self.store.clone())
                .upsert_item(user, item)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn create_link_token() {
        let f = fixture(FakeAggregator::new());
        let link_token = f.dashboard.create_link_token(&user("a")).await.unwrap();
        assert_eq!("link-a", link_token.link_token);
    }

    #[tokio::test]
    async fn create_link_token_failure() {
        let f = fixture(FakeAggregator::new().with_failing_link_token("INVALID_API_KEYS"));
        let err = f.dashboard.create_link_token(&user("a")).await.unwrap_err();
        assert!(matches!(err, DashboardError::Aggregator(_)));
    }

    #[tokio::test]
    async fn exchange_public_token_links_item() {
        let f = fixture(
            FakeAggregator::new()
                .with_public_token("public-1", "access-1", "item-1", Some("ins_1"))
                .with_institution("ins_1", "First Bank")
                .with_item(
                    "access-1",
                    vec![account("a1"), account("a2")],
                    transactions("t", 1, "a1"),
                ),
        );
        let user = user("a");

        let linked = f
            .dashboard
            .exchange_public_token(&user, &PublicToken("public-1".to_string()))
            .await
            .unwrap();
        assert_eq!(
            LinkedInstitution {
                institution_name: "First Bank".to_string(),
                accounts: 2,
                outcome: UpsertOutcome::Added,
            },
            linked
        );

        let items = ItemRegistry::new(f.store.clone())
            .list_items(&user)
            .await
            .unwrap();
        assert_eq!(
            vec![LinkedItem {
                item_id: ItemId::new("item-1"),
                access_token: crate::domain::AccessToken::new("access-1"),
                institution_id: InstitutionId::new("ins_1"),
                institution_name: "First Bank".to_string(),
                date_connected: f.clock.now(),
            }],
            items
        );
        assert_eq!(
            Some("access-1".to_string()),
            f.store.get(&keys::legacy_access_token(&user)).await.unwrap()
        );
        assert_eq!(
            Some("item-1".to_string()),
            f.store.get(&keys::legacy_item_id(&user)).await.unwrap()
        );
    }

    #[tokio::test]
    async fn relinking_replaces_and_invalidates_cache() {
        let f = fixture(
            FakeAggregator::new()
                .with_item("access-old", vec![account("old")], transactions("old", 2, "old"))
                .with_public_token("public-2", "access-new", "item-new", Some("ins_1"))
                .with_institution("ins_1", "First Bank")
                .with_item("access-new", vec![account("new")], transactions("new", 2, "new")),
        );
        let user = user("a");
        f.link(&user, linked_item("item-old", "ins_1", "access-old"))
            .await;

        let first = f.dashboard.fetch_snapshot(&user, false).await.unwrap();
        assert_eq!("old", first.snapshot.accounts[0].account.account_id.as_str());

        let linked = f
            .dashboard
            .exchange_public_token(&user, &PublicToken("public-2".to_string()))
            .await
            .unwrap();
        assert_eq!(UpsertOutcome::Replaced, linked.outcome);

        let items = f.dashboard.list_items(&user).await.unwrap();
        assert_eq!(1, items.len());
        assert_eq!(ItemId::new("item-new"), items[0].item_id);

        let second = f.dashboard.fetch_snapshot(&user, false).await.unwrap();
        assert!(!second.from_cache);
        assert_eq!("new", second.snapshot.accounts[0].account.account_id.as_str());
    }

    #[tokio::test]
    async fn exchange_fails_without_institution() {
        let f = fixture(
            FakeAggregator::new()
                .with_public_token("public-1", "access-1", "item-1", None)
                .with_item("access-1", vec![account("a1")], vec![]),
        );
        let user = user("a");
        let err = f
            .dashboard
            .exchange_public_token(&user, &PublicToken("public-1".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, DashboardError::Internal(_)));
        assert!(f.dashboard.list_items(&user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn exchange_invalid_public_token() {
        let f = fixture(FakeAggregator::new());
        let err = f
            .dashboard
            .exchange_public_token(&user("a"), &PublicToken("bogus".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, DashboardError::Aggregator(_)));
    }

    #[tokio::test]
    async fn fetch_without_items_is_not_linked() {
        let f = fixture(FakeAggregator::new());
        let err = f.dashboard.fetch_snapshot(&user("a"), false).await.unwrap_err();
        assert!(matches!(err, DashboardError::NotLinked));
        let err = f.dashboard.fetch_snapshot(&user("a"), true).await.unwrap_err();
        assert!(matches!(err, DashboardError::NotLinked));
    }

    #[tokio::test]
    async fn fetch_syncs_then_serves_from_cache() {
        let f = fixture(FakeAggregator::new().with_item(
            "access-1",
            vec![account("a1")],
            transactions("t", 5, "a1"),
        ));
        let user = user("a");
        f.link(&user, linked_item("item-1", "ins_1", "access-1")).await;

        let first = f.dashboard.fetch_snapshot(&user, false).await.unwrap();
        assert!(!first.from_cache);
        assert_eq!(5, first.snapshot.transactions.len());
        assert_eq!(Some(f.clock.now()), first.fetched_at);
        assert_eq!(1, f.aggregator.sync_calls().len());

        let second = f.dashboard.fetch_snapshot(&user, false).await.unwrap();
        assert!(second.from_cache);
        assert!(second.truncated_items.is_empty());
        assert_eq!(first.snapshot, second.snapshot);
        assert_eq!(first.fetched_at, second.fetched_at);
        assert_eq!(1, f.aggregator.sync_calls().len());

        let refreshed = f.dashboard.fetch_snapshot(&user, true).await.unwrap();
        assert!(!refreshed.from_cache);
        assert_eq!(2, f.aggregator.sync_calls().len());
    }

    #[tokio::test]
    async fn cache_expires() {
        let f = fixture(FakeAggregator::new().with_item(
            "access-1",
            vec![account("a1")],
            transactions("t", 5, "a1"),
        ));
        let user = user("a");
        f.link(&user, linked_item("item-1", "ins_1", "access-1")).await;

        f.dashboard.fetch_snapshot(&user, false).await.unwrap();
        f.clock.advance(chrono::Duration::seconds(3600));
        let second = f.dashboard.fetch_snapshot(&user, false).await.unwrap();
        assert!(!second.from_cache);
        assert_eq!(2, f.aggregator.sync_calls().len());
    }

    #[tokio::test]
    async fn truncated_item_is_reported_and_cached_as_truncated() {
        let pages = (0..10)
            .map(|i| {
                let cursor = (i > 0).then(|| format!("c{i}"));
                ScriptedPage::new(
                    cursor.as_deref(),
                    transactions(&format!("p{i}"), 100, "a1"),
                    Some(format!("c{}", i + 1).as_str()),
                    true,
                )
            })
            .collect();
        let f = fixture(
            FakeAggregator::new()
                .with_paged_item("access-1", vec![account("a1")], pages)
                .with_item("access-2", vec![account("b1")], transactions("t2", 2, "b1")),
        );
        let user = user("a");
        f.link(&user, linked_item("item-1", "ins_1", "access-1")).await;
        f.link(&user, linked_item("item-2", "ins_2", "access-2")).await;

        let fetched = f.dashboard.fetch_snapshot(&user, false).await.unwrap();
        assert!(!fetched.from_cache);
        assert_eq!(602, fetched.snapshot.transactions.len());
        assert_eq!(vec![ItemId::new("item-1")], fetched.truncated_items);

        let cached = f.dashboard.fetch_snapshot(&user, false).await.unwrap();
        assert!(cached.from_cache);
        assert_eq!(vec![ItemId::new("item-1")], cached.truncated_items);
    }

    #[tokio::test]
    async fn partial_failure_is_reported_and_not_fatal() {
        let f = fixture(
            FakeAggregator::new()
                .with_item(
                    "access-a",
                    vec![account("a1"), account("a2")],
                    transactions("ta", 3, "a1"),
                )
                .with_failing_item("access-b", "ITEM_LOGIN_REQUIRED"),
        );
        let user = user("a");
        f.link(&user, linked_item("item-a", "ins_a", "access-a")).await;
        f.link(&user, linked_item("item-b", "ins_b", "access-b")).await;

        let fetched = f.dashboard.fetch_snapshot(&user, false).await.unwrap();
        assert_eq!(2, fetched.snapshot.accounts.len());
        assert_eq!(1, fetched.item_errors.len());
        assert_eq!(ItemId::new("item-b"), fetched.item_errors[0].item_id);
        assert_eq!(ErrorKind::ReauthRequired, fetched.item_errors[0].kind);
    }

    #[tokio::test]
    async fn all_items_failing_with_auth_error_is_surfaced() {
        let f = fixture(
            FakeAggregator::new()
                .with_failing_item("access-a", "INTERNAL_SERVER_ERROR")
                .with_failing_item("access-b", "INVALID_ACCESS_TOKEN")
                .with_failing_item("access-c", "ITEM_LOGIN_REQUIRED"),
        );
        let user = user("a");
        f.link(&user, linked_item("item-a", "ins_a", "access-a")).await;
        f.link(&user, linked_item("item-b", "ins_b", "access-b")).await;
        f.link(&user, linked_item("item-c", "ins_c", "access-c")).await;

        let err = f.dashboard.fetch_snapshot(&user, false).await.unwrap_err();
        assert!(matches!(err, DashboardError::InvalidToken));
        assert_eq!(Some("INVALID_ACCESS_TOKEN"), err.error_code());

        // Nothing was cached, so the next request syncs again
        assert_eq!(None, f.store.get(&keys::transactions(&user)).await.unwrap());
        assert_eq!(None, f.store.get(&keys::accounts(&user)).await.unwrap());
        // Items stay linked
        assert_eq!(3, f.dashboard.list_items(&user).await.unwrap().len());
    }

    #[tokio::test]
    async fn all_items_failing_without_auth_error_returns_empty() {
        let f = fixture(FakeAggregator::new().with_failing_item("access-a", "INTERNAL_SERVER_ERROR"));
        let user = user("a");
        f.link(&user, linked_item("item-a", "ins_a", "access-a")).await;

        let fetched = f.dashboard.fetch_snapshot(&user, false).await.unwrap();
        assert_eq!(Snapshot::default(), fetched.snapshot);
        assert_eq!(None, fetched.fetched_at);
        assert_eq!(1, fetched.item_errors.len());
        assert_eq!(None, f.store.get(&keys::transactions(&user)).await.unwrap());
    }

    #[tokio::test]
    async fn remove_item_invalidates_cache() {
        let f = fixture(
            FakeAggregator::new()
                .with_item("access-a", vec![account("a1")], transactions("ta", 1, "a1"))
                .with_item("access-b", vec![account("b1")], transactions("tb", 1, "b1")),
        );
        let user = user("a");
        f.link(&user, linked_item("item-a", "ins_a", "access-a")).await;
        f.link(&user, linked_item("item-b", "ins_b", "access-b")).await;
        f.dashboard.fetch_snapshot(&user, false).await.unwrap();

        f.dashboard
            .remove_item(&user, &ItemId::new("item-a"))
            .await
            .unwrap();
        assert_eq!(vec!["access-a".to_string()], f.aggregator.removed_tokens());

        let fetched = f.dashboard.fetch_snapshot(&user, false).await.unwrap();
        assert!(!fetched.from_cache);
        assert_eq!(1, fetched.snapshot.accounts.len());
        assert_eq!("b1", fetched.snapshot.accounts[0].account.account_id.as_str());
    }

    #[tokio::test]
    async fn remove_item_not_found() {
        let f = fixture(FakeAggregator::new());
        let user = user("a");
        let err = f
            .dashboard
            .remove_item(&user, &ItemId::new("item-a"))
            .await
            .unwrap_err();
        assert!(matches!(err, DashboardError::NotLinked));

        f.link(&user, linked_item("item-a", "ins_a", "access-a")).await;
        let err = f
            .dashboard
            .remove_item(&user, &ItemId::new("item-x"))
            .await
            .unwrap_err();
        assert!(matches!(err, DashboardError::ItemNotFound));
    }

    #[tokio::test]
    async fn users_are_isolated() {
        let f = fixture(
            FakeAggregator::new()
                .with_item("access-a", vec![account("a1")], transactions("ta", 1, "a1")),
        );
        f.link(&user("a"), linked_item("item-a", "ins_a", "access-a"))
            .await;

        f.dashboard.fetch_snapshot(&user("a"), false).await.unwrap();
        let err = f.dashboard.fetch_snapshot(&user("b"), false).await.unwrap_err();
        assert!(matches!(err, DashboardError::NotLinked));
        assert!(f.dashboard.list_items(&user("b")).await.unwrap().is_empty());
    }
}
