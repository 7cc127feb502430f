use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    aggregator::{AggregatorError, ExchangedToken, LinkSettings},
    domain::{AccessToken, ItemId, LinkToken, PublicToken, UserId},
};

use super::client::Plaid;

#[derive(Serialize)]
struct LinkTokenCreateRequest<'a> {
    client_name: &'a str,
    language: &'a str,
    country_codes: &'a [String],
    products: &'a [String],
    user: LinkTokenUser<'a>,
}

#[derive(Serialize)]
struct LinkTokenUser<'a> {
    client_user_id: &'a str,
}

#[derive(Deserialize)]
struct LinkTokenCreateResponse {
    link_token: String,
    #[serde(default)]
    expiration: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct PublicTokenExchangeRequest<'a> {
    public_token: &'a str,
}

#[derive(Deserialize)]
struct PublicTokenExchangeResponse {
    access_token: String,
    item_id: String,
}

pub async fn create_link_token(
    client: &Plaid,
    user: &UserId,
    settings: &LinkSettings,
) -> Result<LinkToken, AggregatorError> {
    log::info!("Creating link token...");

    let response: LinkTokenCreateResponse = client
        .post(
            "/link/token/create",
            &LinkTokenCreateRequest {
                client_name: &settings.client_name,
                language: &settings.language,
                country_codes: &settings.country_codes,
                products: &settings.products,
                user: LinkTokenUser {
                    client_user_id: user.as_str(),
                },
            },
        )
        .await?;

    log::info!("Creating link token...done");
    Ok(LinkToken {
        link_token: response.link_token,
        expiration: response.expiration,
    })
}

pub async fn exchange_public_token(
    client: &Plaid,
    public_token: &PublicToken,
) -> Result<ExchangedToken, AggregatorError> {
    log::info!("Exchanging public token...");

    let response: PublicTokenExchangeResponse = client
        .post(
            "/item/public_token/exchange",
            &PublicTokenExchangeRequest {
                public_token: &public_token.0,
            },
        )
        .await?;

    log::info!("Exchanging public token...done");
    Ok(ExchangedToken {
        access_token: AccessToken::new(response.access_token),
        item_id: ItemId(response.item_id),
    })
}
