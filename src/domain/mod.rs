mod account;
pub mod decimal;
mod ids;
mod item;
mod snapshot;
mod tokens;
mod transaction;

pub use account::{Account, Balances, TaggedAccount};
pub use ids::{AccountId, InstitutionId, ItemId, TransactionId, UserId};
pub use item::{LinkedItem, LinkedItemSummary};
pub use snapshot::{Institution, Snapshot};
pub use tokens::{AccessToken, LinkToken, PublicToken};
pub use transaction::{Transaction, TransactionCategory};
