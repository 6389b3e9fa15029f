//! Built-in plugins.

mod cache_policy;
mod dispatch;
mod fetch;
mod fetch_params;
mod persisted_query;
mod throw_on_error;

pub use cache_policy::CachePolicyPlugin;
pub use dispatch::DispatchPlugin;
pub use fetch::FetchPlugin;
pub use fetch_params::FetchParamsPlugin;
pub use persisted_query::{AutomaticPersistedQueries, FixedPersistedQueries};
pub use throw_on_error::ThrowOnErrorPlugin;
