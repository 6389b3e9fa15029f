use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ResolvedValue;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::AsRefStr,
    strum::EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorCode {
    // Used for APQ
    PersistedQueryNotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

/// An error as found in the `errors` of a GraphQL response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphqlError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extensions: Map<String, Value>,
}

impl GraphqlError {
    pub fn new(message: impl Into<String>) -> Self {
        GraphqlError {
            message: message.into(),
            locations: Vec::new(),
            path: Vec::new(),
            extensions: Map::new(),
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.extensions
            .insert("code".to_string(), Value::String(code.as_ref().to_string()));
        self
    }

    /// `extensions.code`, if it's one we know of.
    pub fn code(&self) -> Option<ErrorCode> {
        self.extensions.get("code")?.as_str()?.parse().ok()
    }

    /// The server doesn't know the hash of an automatically persisted query.
    pub fn is_persisted_query_not_found(&self) -> bool {
        self.code() == Some(ErrorCode::PersistedQueryNotFound) || self.message == "PersistedQueryNotFound"
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClientError {
    #[error("Request was cancelled")]
    Cancelled,
    /// Raised by the throw-on-error plugin.
    #[error("{}", graphql_errors_message(.errors))]
    Graphql { errors: Vec<GraphqlError> },
    #[error("Plugin `{plugin}` failed: {message}")]
    Plugin { plugin: String, message: String },
    #[error("Every plugin passed the request on, none produced a value")]
    NoValue,
    #[error("Invalid client configuration: {0}")]
    Configuration(String),
    #[error("Document `{0}` can't be executed")]
    NotExecutable(String),
    #[error("Document `{0}` isn't paginated")]
    NotPaginated(String),
    #[error("No page of `{0}` was loaded yet")]
    NoPageLoaded(String),
}

impl ClientError {
    pub fn plugin(plugin: impl Into<String>, message: impl ToString) -> Self {
        ClientError::Plugin {
            plugin: plugin.into(),
            message: message.to_string(),
        }
    }
}

fn graphql_errors_message(errors: &[GraphqlError]) -> String {
    match errors {
        [] => "GraphQL request failed".to_string(),
        [error] => error.message.clone(),
        [error, rest @ ..] => format!("{} (and {} more errors)", error.message, rest.len()),
    }
}

/// Turns a value carrying GraphQL errors into the error raised by the throw-on-error plugin.
pub type ErrorTransform = std::sync::Arc<dyn Fn(&ResolvedValue) -> ClientError + Send + Sync>;

pub(crate) fn default_error_transform(value: &ResolvedValue) -> ClientError {
    ClientError::Graphql {
        errors: value.errors.clone(),
    }
}
