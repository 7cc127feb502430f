use chrono::{DateTime, Utc};
use rocket::{form::Form, get, http::Status, post, serde::json::Json, FromForm, State};
use serde::{Deserialize, Serialize};

use super::{auth::AuthenticatedUser, error::ApiError};
use crate::{
    aggregator::{INVALID_ACCESS_TOKEN, ITEM_LOGIN_REQUIRED},
    dashboard::{Dashboard, DashboardError},
    domain::{Institution, ItemId, LinkedItemSummary, PublicToken, TaggedAccount, Transaction},
    sync::ItemFailure,
};

#[derive(Serialize)]
pub struct LinkTokenResponse {
    link_token: String,
    expiration: Option<DateTime<Utc>>,
}

#[derive(FromForm)]
pub struct PublicTokenForm {
    public_token: Option<String>,
}

#[derive(Serialize)]
pub struct SetAccessTokenResponse {
    success: bool,
    institution_name: String,
    accounts: usize,
}

#[derive(Serialize)]
pub struct TransactionsResponse {
    transactions: Vec<Transaction>,
    accounts: Vec<TaggedAccount>,
    institutions: Vec<Institution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fetched_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    item_errors: Vec<ItemFailure>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    truncated_items: Vec<ItemId>,
}

#[derive(Deserialize)]
pub struct RemoveItemRequest {
    item_id: Option<String>,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    success: bool,
}

#[derive(Serialize)]
pub struct ItemsResponse {
    items: Vec<LinkedItemSummary>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
}

#[get("/health")]
pub fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[post("/create-link-token")]
pub async fn create_link_token(
    user: AuthenticatedUser,
    dashboard: &State<Dashboard>,
) -> Result<Json<LinkTokenResponse>, ApiError> {
    let link_token = dashboard
        .create_link_token(&user.0)
        .await
        .map_err(|err| ApiError::internal("Failed to create link token", err))?;
    Ok(Json(LinkTokenResponse {
        link_token: link_token.link_token,
        expiration: link_token.expiration,
    }))
}

#[post("/set-access-token", data = "<form>")]
pub async fn set_access_token(
    user: AuthenticatedUser,
    dashboard: &State<Dashboard>,
    form: Option<Form<PublicTokenForm>>,
) -> Result<Json<SetAccessTokenResponse>, ApiError> {
    let Some(public_token) = form
        .and_then(|form| form.into_inner().public_token)
        .filter(|token| !token.is_empty())
    else {
        return Err(ApiError::new(Status::BadRequest, "Public token is required"));
    };

    let linked = dashboard
        .exchange_public_token(&user.0, &PublicToken(public_token))
        .await
        .map_err(|err| ApiError::internal("Failed to exchange public token", err))?;
    Ok(Json(SetAccessTokenResponse {
        success: true,
        institution_name: linked.institution_name,
        accounts: linked.accounts,
    }))
}

#[get("/get-transactions?<refresh>")]
pub async fn get_transactions(
    user: AuthenticatedUser,
    dashboard: &State<Dashboard>,
    refresh: Option<bool>,
) -> Result<Json<TransactionsResponse>, ApiError> {
    let fetched = dashboard
        .fetch_snapshot(&user.0, refresh.unwrap_or(false))
        .await
        .map_err(|err| match err {
            DashboardError::NotLinked => {
                ApiError::new(Status::NotFound, "No linked bank accounts found")
            }
            DashboardError::ReauthRequired => ApiError::with_code(
                Status::BadRequest,
                "Your bank connection needs to be updated. Please reconnect your account.",
                ITEM_LOGIN_REQUIRED,
            ),
            DashboardError::InvalidToken => ApiError::with_code(
                Status::BadRequest,
                "Your bank connection is invalid. Please reconnect your account.",
                INVALID_ACCESS_TOKEN,
            ),
            err => ApiError::internal("Could not retrieve your transactions", err),
        })?;
    Ok(Json(TransactionsResponse {
        transactions: fetched.snapshot.transactions,
        accounts: fetched.snapshot.accounts,
        institutions: fetched.snapshot.institutions,
        fetched_at: fetched.fetched_at,
        item_errors: fetched.item_errors,
        truncated_items: fetched.truncated_items,
    }))
}

#[post("/remove-item", data = "<body>")]
pub async fn remove_item(
    user: AuthenticatedUser,
    dashboard: &State<Dashboard>,
    body: Option<Json<RemoveItemRequest>>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let Some(item_id) = body
        .and_then(|body| body.into_inner().item_id)
        .filter(|item_id| !item_id.is_empty())
    else {
        return Err(ApiError::new(Status::BadRequest, "Item ID is required"));
    };

    dashboard
        .remove_item(&user.0, &ItemId(item_id))
        .await
        .map_err(|err| match err {
            DashboardError::NotLinked => ApiError::new(Status::NotFound, "No items found"),
            DashboardError::ItemNotFound => ApiError::new(Status::NotFound, "Item not found"),
            err => ApiError::internal("Failed to remove item", err),
        })?;
    Ok(Json(SuccessResponse { success: true }))
}

#[get("/items")]
pub async fn list_items(
    user: AuthenticatedUser,
    dashboard: &State<Dashboard>,
) -> Result<Json<ItemsResponse>, ApiError> {
    let items = dashboard
        .list_items(&user.0)
        .await
        .map_err(|err| ApiError::internal("Failed to list items", err))?;
    Ok(Json(ItemsResponse { items }))
}
