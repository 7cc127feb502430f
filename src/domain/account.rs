use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{AccountId, Institution, ItemId};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Balances {
    #[serde(default, with = "crate::domain::decimal::float_option")]
    pub available: Option<Decimal>,
    #[serde(default, with = "crate::domain::decimal::float_option")]
    pub current: Option<Decimal>,
    pub iso_currency_code: Option<String>,
    #[serde(default, with = "crate::domain::decimal::float_option")]
    pub limit: Option<Decimal>,
}

/// An account as reported by the aggregator
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub account_id: AccountId,
    pub balances: Balances,
    pub mask: Option<String>,
    pub name: String,
    pub official_name: Option<String>,
    #[serde(rename = "type")]
    pub type_: String,
    pub subtype: Option<String>,
}

/// An account annotated with the linked item and institution it came from
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TaggedAccount {
    #[serde(flatten)]
    pub account: Account,
    pub item_id: ItemId,
    pub institution: Institution,
}

impl TaggedAccount {
    pub fn new(account: Account, item_id: ItemId, institution: Institution) -> Self {
        Self {
            account,
            item_id,
            institution,
        }
    }
}
