use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Identity of an authenticated user. Used as the partition key into the store,
/// so it can't be empty and can't contain the key separator.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        ensure!(!id.trim().is_empty(), "User id must not be empty");
        ensure!(!id.contains(':'), "User id must not contain ':'");
        ensure!(
            !id.chars().any(char::is_whitespace),
            "User id must not contain whitespace"
        );
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// A single linked bank connection at the aggregator
    ItemId
);
string_id!(InstitutionId);
string_id!(AccountId);
string_id!(TransactionId);
