use serde::{Deserialize, Serialize};

use super::{InstitutionId, TaggedAccount, Transaction};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Institution {
    pub institution_id: InstitutionId,
    pub name: String,
}

/// The merged view of all of a user's linked items
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub transactions: Vec<Transaction>,
    pub accounts: Vec<TaggedAccount>,
    pub institutions: Vec<Institution>,
}

impl Snapshot {
    /// Only snapshots with both transactions and accounts are worth caching.
    /// Anything else is treated like a cache miss.
    pub fn is_cacheable(&self) -> bool {
        !self.transactions.is_empty() && !self.accounts.is_empty()
    }
}
