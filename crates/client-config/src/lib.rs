//! Configuration of the GraphQL client runtime.
//!
//! Loading the configuration is left to the embedding application, this crate only defines its
//! shape and defaults.

mod log_level;
mod types;

use std::time::Duration;

use indexmap::IndexMap;
use operation_artifact::{ArtifactKind, CachePolicy, ListPosition, NodeLookup};

pub use log_level::LogLevel;
pub use types::{ResolveArgument, ResolveConfig, TypeConfig};

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// GraphQL endpoint requests are sent to.
    pub url: Option<url::Url>,
    /// Headers sent with every request.
    pub headers: IndexMap<String, String>,
    /// Policy of documents that don't declare one.
    pub default_cache_policy: CachePolicy,
    /// Fields identifying an entity when its type doesn't configure its own.
    pub default_keys: Vec<String>,
    pub types: IndexMap<String, TypeConfig>,
    pub throw_on_error: ThrowOnErrorConfig,
    pub persisted_queries: PersistedQueriesConfig,
    pub pagination: PaginationConfig,
    pub cache: CacheConfig,
    /// Maximum duration of a single network request.
    #[serde(deserialize_with = "duration_str::deserialize_option_duration")]
    pub request_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            url: None,
            headers: IndexMap::new(),
            default_cache_policy: CachePolicy::default(),
            default_keys: vec!["id".to_string()],
            types: IndexMap::new(),
            throw_on_error: ThrowOnErrorConfig::default(),
            persisted_queries: PersistedQueriesConfig::default(),
            pagination: PaginationConfig::default(),
            cache: CacheConfig::default(),
            request_timeout: None,
        }
    }
}

impl ClientConfig {
    /// How an entity of this type is fetched on its own, `node(id: ID!)` unless configured.
    pub fn node_lookup(&self, typename: &str) -> NodeLookup {
        self.types
            .get(typename)
            .and_then(|config| config.resolve.as_ref())
            .map(NodeLookup::from)
            .unwrap_or_default()
    }
}

/// Operations whose GraphQL errors are turned into a failure of the request.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThrowOnErrorConfig {
    pub operations: Vec<ThrowOnErrorOperation>,
}

impl ThrowOnErrorConfig {
    pub fn is_enabled(&self) -> bool {
        !self.operations.is_empty()
    }

    pub fn applies_to(&self, kind: ArtifactKind) -> bool {
        self.operations.iter().any(|operation| operation.matches(kind))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThrowOnErrorOperation {
    Query,
    Mutation,
    Subscription,
    All,
}

impl ThrowOnErrorOperation {
    pub fn matches(self, kind: ArtifactKind) -> bool {
        match self {
            ThrowOnErrorOperation::All => true,
            ThrowOnErrorOperation::Query => kind == ArtifactKind::Query,
            ThrowOnErrorOperation::Mutation => kind == ArtifactKind::Mutation,
            ThrowOnErrorOperation::Subscription => kind == ArtifactKind::Subscription,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PersistedQueriesConfig {
    pub mode: PersistedQueryMode,
    /// Level of the event logged when the server doesn't know a hash and the full document is
    /// sent instead.
    pub fallback_log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PersistedQueryMode {
    /// The document text is always sent.
    #[default]
    Disabled,
    /// Only the hash is sent at first, the text follows if the server doesn't know it.
    Automatic,
    /// Only the hash is ever sent, as `doc_id`.
    Fixed,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PaginationConfig {
    /// Page size of paginated fields without an explicit one.
    pub default_page_size: usize,
    /// Where list operations insert when they don't say.
    pub default_list_position: ListPosition,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        PaginationConfig {
            default_page_size: 10,
            default_list_position: ListPosition::Last,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Garbage collection ticks a record without subscriber survives.
    pub default_lifetime: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig { default_lifetime: 10 }
    }
}
