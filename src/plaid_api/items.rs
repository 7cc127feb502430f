use serde::{Deserialize, Serialize};

use crate::{
    aggregator::{AggregatorError, ItemInfo},
    domain::{AccessToken, Institution, InstitutionId, ItemId},
};

use super::client::Plaid;

#[derive(Serialize)]
struct AccessTokenRequest<'a> {
    access_token: &'a str,
}

#[derive(Deserialize)]
struct ItemGetResponse {
    item: PlaidItem,
}

#[derive(Deserialize)]
struct PlaidItem {
    item_id: String,
    #[serde(default)]
    institution_id: Option<String>,
}

#[derive(Deserialize)]
struct ItemRemoveResponse {}

#[derive(Serialize)]
struct InstitutionGetRequest<'a> {
    institution_id: &'a str,
    country_codes: &'a [String],
}

#[derive(Deserialize)]
struct InstitutionGetResponse {
    institution: PlaidInstitution,
}

#[derive(Deserialize)]
struct PlaidInstitution {
    institution_id: String,
    name: String,
}

pub async fn get_item(client: &Plaid, access_token: &AccessToken) -> Result<ItemInfo, AggregatorError> {
    let response: ItemGetResponse = client
        .post(
            "/item/get",
            &AccessTokenRequest {
                access_token: access_token.get(),
            },
        )
        .await?;
    Ok(ItemInfo {
        item_id: ItemId(response.item.item_id),
        institution_id: response.item.institution_id.map(InstitutionId),
    })
}

pub async fn remove_item(client: &Plaid, access_token: &AccessToken) -> Result<(), AggregatorError> {
    log::info!("Revoking access token...");
    let _: ItemRemoveResponse = client
        .post(
            "/item/remove",
            &AccessTokenRequest {
                access_token: access_token.get(),
            },
        )
        .await?;
    log::info!("Revoking access token...done");
    Ok(())
}

pub async fn get_institution(
    client: &Plaid,
    institution_id: &InstitutionId,
) -> Result<Institution, AggregatorError> {
    let response: InstitutionGetResponse = client
        .post(
            "/institutions/get_by_id",
            &InstitutionGetRequest {
                institution_id: institution_id.as_str(),
                country_codes: &client.institution_country_codes,
            },
        )
        .await?;
    Ok(Institution {
        institution_id: InstitutionId(response.institution.institution_id),
        name: response.institution.name,
    })
}
