//! The seam between the sync pipeline and the bank-data aggregation service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;

use crate::domain::{
    AccessToken, Account, Institution, InstitutionId, ItemId, LinkToken, PublicToken, Transaction,
    UserId,
};

pub const ITEM_LOGIN_REQUIRED: &str = "ITEM_LOGIN_REQUIRED";
pub const INVALID_ACCESS_TOKEN: &str = "INVALID_ACCESS_TOKEN";

/// Error body the aggregator returns for failed calls
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PlaidError {
    pub error_type: String,
    pub error_code: String,
    pub error_message: String,
    #[serde(default)]
    pub display_message: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
}

impl PlaidError {
    pub fn new(error_type: &str, error_code: &str, error_message: &str) -> Self {
        Self {
            error_type: error_type.to_string(),
            error_code: error_code.to_string(),
            error_message: error_message.to_string(),
            display_message: None,
            request_id: None,
        }
    }
}

impl Display for PlaidError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}: {}",
            self.error_type, self.error_code, self.error_message
        )
    }
}

#[derive(Error, Debug)]
pub enum AggregatorError {
    #[error("Aggregator returned an error: {0}")]
    Api(PlaidError),

    #[error("Failed to reach aggregator: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Aggregator returned an unexpected response: {0}")]
    InvalidResponse(String),
}

/// Coarse classification of aggregator failures, as far as callers care
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The user has to go through the link flow again for this item
    ReauthRequired,
    InvalidToken,
    Other,
}

impl ErrorKind {
    pub fn is_auth(self) -> bool {
        matches!(self, ErrorKind::ReauthRequired | ErrorKind::InvalidToken)
    }
}

impl AggregatorError {
    pub fn error_code(&self) -> Option<&str> {
        match self {
            AggregatorError::Api(error) => Some(&error.error_code),
            AggregatorError::Transport(_) | AggregatorError::InvalidResponse(_) => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self.error_code() {
            Some(ITEM_LOGIN_REQUIRED) => ErrorKind::ReauthRequired,
            Some(INVALID_ACCESS_TOKEN) => ErrorKind::InvalidToken,
            _ => ErrorKind::Other,
        }
    }
}

/// Settings the link widget session is created with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSettings {
    pub client_name: String,
    pub products: Vec<String>,
    pub country_codes: Vec<String>,
    pub language: String,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            client_name: "Personal Finance Dashboard".to_string(),
            products: vec![
                "transactions".to_string(),
                "investments".to_string(),
                "auth".to_string(),
            ],
            country_codes: vec!["US".to_string(), "ES".to_string()],
            language: "en".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangedToken {
    pub access_token: AccessToken,
    pub item_id: ItemId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemInfo {
    pub item_id: ItemId,
    /// Not every item reports its institution
    pub institution_id: Option<InstitutionId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionsSyncRequest {
    pub cursor: Option<String>,
    pub count: usize,
    /// Backfill window, only meaningful for the first page of an item
    pub days_requested: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionsPage {
    pub added: Vec<Transaction>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

#[async_trait]
pub trait Aggregator: Send + Sync {
    async fn create_link_token(
        &self,
        user: &UserId,
        settings: &LinkSettings,
    ) -> Result<LinkToken, AggregatorError>;

    async fn exchange_public_token(
        &self,
        public_token: &PublicToken,
    ) -> Result<ExchangedToken, AggregatorError>;

    async fn get_item(&self, access_token: &AccessToken) -> Result<ItemInfo, AggregatorError>;

    async fn get_institution(
        &self,
        institution_id: &InstitutionId,
    ) -> Result<Institution, AggregatorError>;

    async fn get_accounts(&self, access_token: &AccessToken)
        -> Result<Vec<Account>, AggregatorError>;

    async fn sync_transactions(
        &self,
        access_token: &AccessToken,
        request: &TransactionsSyncRequest,
    ) -> Result<TransactionsPage, AggregatorError>;

    /// Revoke the access token at the aggregator
    async fn remove_item(&self, access_token: &AccessToken) -> Result<(), AggregatorError>;
}
