//! Synchronizes all linked items of a user and merges them into one snapshot.

use futures::stream::{self, StreamExt as _};
use serde::Serialize;

use crate::{
    aggregator::{Aggregator, AggregatorError, ErrorKind},
    config::SyncConfig,
    domain::{Institution, InstitutionId, ItemId, LinkedItem, Snapshot, TaggedAccount, Transaction},
};

mod pagination;

pub use pagination::{fetch_all_transactions, PagedTransactions};

/// An item that couldn't be synced and is missing from the snapshot
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub item_id: ItemId,
    pub institution_id: InstitutionId,
    pub institution_name: String,
    pub kind: ErrorKind,
    pub error_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    pub snapshot: Snapshot,
    /// Failed items in registry order
    pub failures: Vec<ItemFailure>,
    pub truncated_items: Vec<ItemId>,
}

impl SyncOutcome {
    pub fn all_items_failed(&self) -> bool {
        !self.failures.is_empty()
            && self.snapshot.accounts.is_empty()
            && self.snapshot.transactions.is_empty()
            && self.snapshot.institutions.is_empty()
    }
}

struct ItemSnapshot {
    transactions: Vec<Transaction>,
    accounts: Vec<TaggedAccount>,
    truncated: bool,
}

async fn sync_item(
    aggregator: &dyn Aggregator,
    item: &LinkedItem,
    config: &SyncConfig,
) -> Result<ItemSnapshot, AggregatorError> {
    log::info!(
        "Syncing item {} ({})...",
        item.item_id,
        item.institution_name
    );
    let paged = fetch_all_transactions(aggregator, &item.access_token, config).await?;

    let accounts = aggregator.get_accounts(&item.access_token).await?;

    let institution = item.institution();
    let accounts = accounts
        .into_iter()
        .map(|account| TaggedAccount::new(account, item.item_id.clone(), institution.clone()))
        .collect();

    log::info!(
        "Syncing item {} ({})...done",
        item.item_id,
        item.institution_name
    );
    Ok(ItemSnapshot {
        transactions: paged.transactions,
        accounts,
        truncated: paged.truncated,
    })
}

/// Sync every item and merge whatever succeeded.
///
/// A failing item never fails the whole run, it ends up in [SyncOutcome::failures] instead.
/// Up to `max_concurrency` items are in flight at the same time, but the results are
/// merged in registry order.
pub async fn sync_items(
    aggregator: &dyn Aggregator,
    items: &[LinkedItem],
    config: &SyncConfig,
) -> SyncOutcome {
    let syncs: Vec<_> = items
        .iter()
        .map(|item| sync_item(aggregator, item, config))
        .collect();
    let results: Vec<_> = stream::iter(syncs)
        .buffered(config.max_concurrency.max(1))
        .collect()
        .await;

    let mut outcome = SyncOutcome {
        snapshot: Snapshot::default(),
        failures: Vec::new(),
        truncated_items: Vec::new(),
    };
    for (item, result) in items.iter().zip(results) {
        match result {
            Ok(item_snapshot) => {
                outcome.snapshot.transactions.extend(item_snapshot.transactions);
                outcome.snapshot.accounts.extend(item_snapshot.accounts);
                record_institution(&mut outcome.snapshot.institutions, item.institution());
                if item_snapshot.truncated {
                    outcome.truncated_items.push(item.item_id.clone());
                }
            }
            Err(err) => {
                log::error!(
                    "Failed to sync item {} ({}): {err}",
                    item.item_id,
                    item.institution_name
                );
                outcome.failures.push(ItemFailure {
                    item_id: item.item_id.clone(),
                    institution_id: item.institution_id.clone(),
                    institution_name: item.institution_name.clone(),
                    kind: err.kind(),
                    error_code: err.error_code().map(str::to_string),
                });
            }
        }
    }
    outcome
}

/// Institutions keep the position they were first seen at, but the latest name wins
fn record_institution(institutions: &mut Vec<Institution>, institution: Institution) {
    match institutions
        .iter_mut()
        .find(|existing| existing.institution_id == institution.institution_id)
    {
        Some(existing) => *existing = institution,
        None => institutions.push(institution),
    }
}
