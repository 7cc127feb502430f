use async_trait::async_trait;

use crate::{
    aggregator::{
        Aggregator, AggregatorError, ExchangedToken, ItemInfo, LinkSettings, TransactionsPage,
        TransactionsSyncRequest,
    },
    domain::{
        AccessToken, Account, Institution, InstitutionId, LinkToken, PublicToken, UserId,
    },
};

mod accounts;
mod client;
mod items;
mod link_token;
mod transactions;

pub use client::Plaid;

#[async_trait]
impl Aggregator for Plaid {
    async fn create_link_token(
        &self,
        user: &UserId,
        settings: &LinkSettings,
    ) -> Result<LinkToken, AggregatorError> {
        link_token::create_link_token(self, user, settings).await
    }

    async fn exchange_public_token(
        &self,
        public_token: &PublicToken,
    ) -> Result<ExchangedToken, AggregatorError> {
        link_token::exchange_public_token(self, public_token).await
    }

    async fn get_item(&self, access_token: &AccessToken) -> Result<ItemInfo, AggregatorError> {
        items::get_item(self, access_token).await
    }

    async fn get_institution(
        &self,
        institution_id: &InstitutionId,
    ) -> Result<Institution, AggregatorError> {
        items::get_institution(self, institution_id).await
    }

    async fn get_accounts(
        &self,
        access_token: &AccessToken,
    ) -> Result<Vec<Account>, AggregatorError> {
        accounts::get_accounts(self, access_token).await
    }

    async fn sync_transactions(
        &self,
        access_token: &AccessToken,
        request: &TransactionsSyncRequest,
    ) -> Result<TransactionsPage, AggregatorError> {
        transactions::sync_transactions_page(self, access_token, request).await
    }

    async fn remove_item(&self, access_token: &AccessToken) -> Result<(), AggregatorError> {
        items::remove_item(self, access_token).await
    }
}
