use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use super::{AccountId, TransactionId};

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
pub struct TransactionCategory {
    pub primary: String,
    pub detailed: String,
}

impl Debug for TransactionCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.primary, self.detailed)
    }
}

/// A transaction as reported by the aggregator.
///
/// `amount` keeps the aggregator's sign convention: positive is money leaving
/// the account, negative is money coming in.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub transaction_id: TransactionId,
    pub account_id: AccountId,
    #[serde(with = "super::decimal::float")]
    pub amount: Decimal,
    pub iso_currency_code: Option<String>,
    pub date: NaiveDate,
    pub authorized_date: Option<NaiveDate>,
    pub name: String,
    pub merchant_name: Option<String>,
    #[serde(default)]
    pub category: Vec<String>,
    pub personal_finance_category: Option<TransactionCategory>,
    pub pending: bool,
    pub payment_channel: String,
}
