use normalized_cache::{PageInfo, ReadResult};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{FetchError, GraphqlError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ValueSource {
    Cache,
    Network,
}

/// Body of a GraphQL response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct GraphqlResponse {
    pub data: Option<Value>,
    pub errors: Vec<GraphqlError>,
    pub extensions: Map<String, Value>,
}

/// What an invocation resolves to.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedValue {
    pub data: Option<Value>,
    pub errors: Vec<GraphqlError>,
    /// Set when no response was received at all.
    pub network_error: Option<FetchError>,
    pub page_info: Option<PageInfo>,
    pub source: ValueSource,
    /// Data read from the cache with some fields missing.
    pub partial: bool,
}

impl ResolvedValue {
    pub fn from_response(response: GraphqlResponse) -> Self {
        ResolvedValue {
            data: response.data.filter(|data| !data.is_null()),
            errors: response.errors,
            network_error: None,
            page_info: None,
            source: ValueSource::Network,
            partial: false,
        }
    }

    pub fn from_cache(read: ReadResult) -> Self {
        ResolvedValue {
            data: Some(read.data).filter(|data| !data.is_null()),
            errors: Vec::new(),
            network_error: None,
            page_info: None,
            source: ValueSource::Cache,
            partial: read.partial,
        }
    }

    pub fn from_network_error(error: FetchError) -> Self {
        ResolvedValue {
            data: None,
            errors: Vec::new(),
            network_error: Some(error),
            page_info: None,
            source: ValueSource::Network,
            partial: false,
        }
    }

    #[must_use]
    pub fn with_page_info(mut self, page_info: Option<PageInfo>) -> Self {
        self.page_info = page_info;
        self
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn is_persisted_query_not_found(&self) -> bool {
        self.errors.iter().any(GraphqlError::is_persisted_query_not_found)
    }
}
