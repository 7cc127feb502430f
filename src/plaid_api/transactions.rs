use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    aggregator::{AggregatorError, TransactionsPage, TransactionsSyncRequest},
    domain::{AccessToken, AccountId, Transaction, TransactionCategory, TransactionId},
};

use super::client::Plaid;

#[derive(Serialize)]
struct TransactionsSyncBody<'a> {
    access_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cursor: Option<&'a str>,
    count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<TransactionsSyncOptions>,
}

#[derive(Serialize)]
struct TransactionsSyncOptions {
    days_requested: u32,
}

#[derive(Deserialize)]
struct TransactionsSyncResponse {
    added: Vec<PlaidTransaction>,
    #[serde(default)]
    modified: Vec<serde_json::Value>,
    #[serde(default)]
    removed: Vec<serde_json::Value>,
    #[serde(default)]
    next_cursor: String,
    has_more: bool,
}

#[derive(Deserialize)]
struct PlaidTransaction {
    transaction_id: String,
    account_id: String,
    #[serde(with = "crate::domain::decimal::float")]
    amount: Decimal,
    #[serde(default)]
    iso_currency_code: Option<String>,
    date: NaiveDate,
    #[serde(default)]
    authorized_date: Option<NaiveDate>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    merchant_name: Option<String>,
    /// Deprecated category list, some institutions report `null`
    #[serde(default)]
    category: Option<Vec<String>>,
    #[serde(default)]
    personal_finance_category: Option<PlaidCategory>,
    pending: bool,
    #[serde(default)]
    payment_channel: Option<String>,
}

#[derive(Deserialize)]
struct PlaidCategory {
    primary: String,
    detailed: String,
}

impl From<PlaidTransaction> for Transaction {
    fn from(transaction: PlaidTransaction) -> Self {
        Transaction {
            transaction_id: TransactionId(transaction.transaction_id),
            account_id: AccountId(transaction.account_id),
            amount: transaction.amount,
            iso_currency_code: transaction.iso_currency_code,
            date: transaction.date,
            authorized_date: transaction.authorized_date,
            name: transaction.name.unwrap_or_default(),
            merchant_name: transaction.merchant_name,
            category: transaction.category.unwrap_or_default(),
            personal_finance_category: transaction.personal_finance_category.map(|category| {
                TransactionCategory {
                    primary: category.primary,
                    detailed: category.detailed,
                }
            }),
            pending: transaction.pending,
            payment_channel: transaction.payment_channel.unwrap_or_default(),
        }
    }
}

/// Request one page of the incremental transaction sync
pub async fn sync_transactions_page(
    client: &Plaid,
    access_token: &AccessToken,
    request: &TransactionsSyncRequest,
) -> Result<TransactionsPage, AggregatorError> {
    let body = TransactionsSyncBody {
        access_token: access_token.get(),
        cursor: request.cursor.as_deref(),
        count: request.count,
        options: request
            .days_requested
            .map(|days_requested| TransactionsSyncOptions { days_requested }),
    };
    let response: TransactionsSyncResponse = client.post("/transactions/sync", &body).await?;

    // Every sync starts from an empty cursor, so there is nothing to modify or remove yet
    if !response.modified.is_empty() || !response.removed.is_empty() {
        log::warn!(
            "Ignoring {} modified and {} removed transactions",
            response.modified.len(),
            response.removed.len()
        );
    }

    let next_cursor = Some(response.next_cursor).filter(|cursor| !cursor.is_empty());
    Ok(TransactionsPage {
        added: response.added.into_iter().map(Transaction::from).collect(),
        next_cursor,
        has_more: response.has_more,
    })
}
