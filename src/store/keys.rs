//! Store key layout. Everything is partitioned by user under `plaid:{user_id}:`.

use crate::domain::UserId;

fn user_key(user: &UserId, field: &str) -> String {
    format!("plaid:{user}:{field}")
}

/// Full list of linked items, never expires
pub fn items(user: &UserId) -> String {
    user_key(user, "items")
}

pub fn transactions(user: &UserId) -> String {
    user_key(user, "transactions")
}

pub fn accounts(user: &UserId) -> String {
    user_key(user, "accounts")
}

pub fn institutions(user: &UserId) -> String {
    user_key(user, "institutions")
}

pub fn fetched_at(user: &UserId) -> String {
    user_key(user, "fetched_at")
}

/// Items whose transactions were cut off at the per-item cap
pub fn truncated_items(user: &UserId) -> String {
    user_key(user, "truncated_items")
}

/// Single-token field for readers that only know about one linked item
pub fn legacy_access_token(user: &UserId) -> String {
    user_key(user, "access_token")
}

pub fn legacy_item_id(user: &UserId) -> String {
    user_key(user, "item_id")
}
