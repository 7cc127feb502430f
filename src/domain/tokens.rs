use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};

/// Durable credential for one linked item. It is a secret, so `Debug` doesn't print it.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct AccessToken {
    access_token: String,
}

impl AccessToken {
    pub fn new(access_token: impl Into<String>) -> AccessToken {
        AccessToken {
            access_token: access_token.into(),
        }
    }

    pub fn get(&self) -> &str {
        &self.access_token
    }
}

impl Debug for AccessToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccessToken(*****)")
    }
}

/// Short-lived token handed to the browser-side link widget
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LinkToken {
    pub link_token: String,
    pub expiration: Option<DateTime<Utc>>,
}

/// Short-lived token the link widget returns after the user connected a bank
#[derive(Clone, PartialEq, Eq)]
pub struct PublicToken(pub String);

impl Debug for PublicToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicToken(*****)")
    }
}
