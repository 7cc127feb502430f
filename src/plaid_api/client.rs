use anyhow::{Context as _, Result};
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    aggregator::{AggregatorError, LinkSettings, PlaidError},
    config::PlaidConfig,
};

const API_VERSION: &str = "2020-09-14";

/// Authenticated client for the Plaid REST API
pub struct Plaid {
    http: Client,
    base_url: String,
    client_id: String,
    secret: String,
    pub(super) institution_country_codes: Vec<String>,
    pub(super) link: LinkSettings,
}

impl Plaid {
    pub fn new(config: &PlaidConfig) -> Result<Plaid> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Plaid {
            http,
            base_url: config.base_url().trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            secret: config.secret.clone(),
            institution_country_codes: config.institution_country_codes.clone(),
            link: config.link.clone(),
        })
    }

    pub fn link_settings(&self) -> &LinkSettings {
        &self.link
    }

    pub(super) async fn post<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp, AggregatorError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .header("PLAID-CLIENT-ID", &self.client_id)
            .header("PLAID-SECRET", &self.secret)
            .header("Plaid-Version", API_VERSION)
            .json(body)
            .send()
            .await?;
        let status = response.status();
        let body = response.bytes().await?;

        if status.is_success() {
            serde_json::from_slice(&body).map_err(|err| {
                AggregatorError::InvalidResponse(format!("Failed to parse response of {path}: {err}"))
            })
        } else {
            Err(parse_error(path, status, &body))
        }
    }
}

fn parse_error(path: &str, status: StatusCode, body: &[u8]) -> AggregatorError {
    match serde_json::from_slice::<PlaidError>(body) {
        Ok(error) => AggregatorError::Api(error),
        Err(_) => AggregatorError::InvalidResponse(format!("{path} failed with HTTP {status}")),
    }
}
