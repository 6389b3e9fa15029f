//! GraphQL client runtime.
//!
//! Every invocation of a document goes through a chain of [`Plugin`]s: fetch params, dispatch,
//! cache policy, client plugins, persisted queries and finally the network. Responses are
//! normalized into a [`normalized_cache::Store`] that document handles stay subscribed to.

mod client;
mod context;
mod document;
mod error;
mod fragment;
mod pagination;
mod plugin;
mod transport;
mod value;

pub mod pipeline;
pub mod plugins;

pub use client::{Client, ClientBuilder, ExecuteOptions};
pub use context::{
    default_fetch_params, ContextState, CorrelationToken, FetchParams, FetchParamsFn, FetchParamsInput,
    PersistedQueryExtension, RequestBody, RequestContext, RequestExtensions,
};
pub use document::{DocumentHandle, DocumentState};
pub use error::{ClientError, ErrorCode, ErrorTransform, GraphqlError, Location};
pub use fragment::FragmentHandle;
pub use pagination::{PageDirection, PageLoad};
pub use plugin::{AfterFlow, BeforeFlow, Plugin, ValueStream};
pub use transport::{
    EventStream, FetchError, FetchRequest, FetchResponse, FetchResult, Fetcher, FetcherInner, NativeFetcher,
};
pub use value::{GraphqlResponse, ResolvedValue, ValueSource};

pub(crate) use error::default_error_transform;
