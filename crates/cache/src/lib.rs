//! Normalized GraphQL response cache.
//!
//! Responses are split into one record per entity identity (`Typename:id`), referenced from
//! their owners. Paginated and `@list` fields are kept as list field states merging every page
//! fetched so far.

mod key;
mod lists;
mod pagination;
mod read;
mod record;
mod store;
mod write;

pub use key::{EntityKey, InvalidKey, KeyConfig, ROOT_KEY};
pub use lists::ListKey;
pub use pagination::{ListEntry, ListFieldState, MergeMode, PageArguments, PageInfo, PageRequest};
pub use read::ReadResult;
pub use record::{EntityRecord, FieldValue};
pub use store::{PageLoadGuard, Store, StoreSettings, SubscriptionCallback, SubscriptionId};
pub use write::{WriteError, WriteOutcome};
