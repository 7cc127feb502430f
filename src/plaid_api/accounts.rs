use serde::{Deserialize, Serialize};

use crate::{
    aggregator::AggregatorError,
    domain::{AccessToken, Account, AccountId, Balances},
};

use super::client::Plaid;

#[derive(Serialize)]
struct AccountsGetRequest<'a> {
    access_token: &'a str,
}

#[derive(Deserialize)]
struct AccountsGetResponse {
    accounts: Vec<PlaidAccount>,
}

#[derive(Deserialize)]
struct PlaidAccount {
    account_id: String,
    balances: Balances,
    #[serde(default)]
    mask: Option<String>,
    name: String,
    #[serde(default)]
    official_name: Option<String>,
    #[serde(rename = "type")]
    type_: String,
    #[serde(default)]
    subtype: Option<String>,
}

impl From<PlaidAccount> for Account {
    fn from(account: PlaidAccount) -> Self {
        Account {
            account_id: AccountId(account.account_id),
            balances: account.balances,
            mask: account.mask,
            name: account.name,
            official_name: account.official_name,
            type_: account.type_,
            subtype: account.subtype,
        }
    }
}

pub async fn get_accounts(
    client: &Plaid,
    access_token: &AccessToken,
) -> Result<Vec<Account>, AggregatorError> {
    log::info!("Requesting accounts...");

    let response: AccountsGetResponse = client
        .post(
            "/accounts/get",
            &AccountsGetRequest {
                access_token: access_token.get(),
            },
        )
        .await?;
    let result = response.accounts.into_iter().map(Account::from).collect();

    log::info!("Requesting accounts...done");
    Ok(result)
}
