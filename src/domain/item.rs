use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccessToken, Institution, InstitutionId, ItemId};

/// One linked bank connection of a user, as persisted in the item registry.
///
/// A user has at most one item per institution; re-linking an institution
/// replaces the previous record.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LinkedItem {
    pub item_id: ItemId,
    pub access_token: AccessToken,
    pub institution_id: InstitutionId,
    pub institution_name: String,
    pub date_connected: DateTime<Utc>,
}

impl LinkedItem {
    pub fn institution(&self) -> Institution {
        Institution {
            institution_id: self.institution_id.clone(),
            name: self.institution_name.clone(),
        }
    }

    pub fn summary(&self) -> LinkedItemSummary {
        LinkedItemSummary {
            item_id: self.item_id.clone(),
            institution_id: self.institution_id.clone(),
            institution_name: self.institution_name.clone(),
            date_connected: self.date_connected,
        }
    }
}

/// A linked item without its credentials, safe to hand out to clients
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LinkedItemSummary {
    pub item_id: ItemId,
    pub institution_id: InstitutionId,
    pub institution_name: String,
    pub date_connected: DateTime<Utc>,
}
