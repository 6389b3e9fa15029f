use std::sync::Arc;

use operation_artifact::{CachePolicy, DocumentArtifact, Variables};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use ulid::Ulid;

/// Identifies one invocation and cancels it.
///
/// Once cancelled, every remaining step of the invocation is skipped and nothing it received is
/// written to the cache.
#[derive(Debug, Clone)]
pub struct CorrelationToken {
    id: Ulid,
    cancellation: CancellationToken,
}

impl Default for CorrelationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CorrelationToken {
    pub fn new() -> Self {
        CorrelationToken {
            id: Ulid::new(),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> Ulid {
        self.id
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await;
    }

    pub(crate) fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }
}

#[serde_with::serde_as]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedQueryExtension {
    pub version: u32,
    #[serde_as(as = "serde_with::hex::Hex")]
    pub sha256_hash: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestExtensions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persisted_query: Option<PersistedQueryExtension>,
    #[serde(flatten)]
    pub custom: Map<String, Value>,
}

impl RequestExtensions {
    pub fn is_empty(&self) -> bool {
        self.persisted_query.is_none() && self.custom.is_empty()
    }
}

/// JSON body of a GraphQL request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RequestBody {
    /// Document text. Left out when only a hash is sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Hash of a document from a fixed list of persisted queries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
    #[serde(rename = "operationName", skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    pub variables: Variables,
    #[serde(skip_serializing_if = "RequestExtensions::is_empty")]
    pub extensions: RequestExtensions,
}

/// Transport parameters of an invocation.
#[derive(Debug, Clone, Default)]
pub struct FetchParams {
    pub headers: http::HeaderMap,
    pub body: RequestBody,
}

/// What the fetch params function gets to work with.
pub struct FetchParamsInput<'a> {
    pub text: &'a str,
    pub hash: &'a str,
    pub artifact: &'a DocumentArtifact,
    pub policy: CachePolicy,
    pub variables: &'a Variables,
    pub metadata: &'a Map<String, Value>,
    pub session: &'a Map<String, Value>,
    pub stuff: &'a Map<String, Value>,
}

pub type FetchParamsFn = Arc<dyn Fn(&FetchParamsInput<'_>) -> FetchParams + Send + Sync>;

/// Sends the document text and variables, with the configured headers.
pub fn default_fetch_params(input: &FetchParamsInput<'_>) -> FetchParams {
    FetchParams {
        headers: http::HeaderMap::new(),
        body: RequestBody {
            query: Some(input.text.to_string()),
            operation_name: Some(input.artifact.name.clone()),
            variables: input.variables.clone(),
            ..Default::default()
        },
    }
}

/// Flags plugins leave for each other along one invocation.
#[derive(Debug, Clone, Default)]
pub struct ContextState {
    /// The body sent carries a hash without the document text.
    pub hash_only: bool,
    /// The full document was already sent again after the server missed its hash.
    pub persisted_retry: bool,
}

/// Mutable record of one invocation, owned by its pipeline run.
pub struct RequestContext {
    pub artifact: Arc<DocumentArtifact>,
    pub variables: Variables,
    pub policy: CachePolicy,
    pub session: Map<String, Value>,
    pub metadata: Map<String, Value>,
    /// Free-form values plugins share.
    pub stuff: Map<String, Value>,
    pub fetch_params: FetchParams,
    pub state: ContextState,
    pub token: CorrelationToken,
}

impl RequestContext {
    pub fn new(artifact: Arc<DocumentArtifact>, variables: Variables, policy: CachePolicy) -> Self {
        RequestContext {
            artifact,
            variables,
            policy,
            session: Map::new(),
            metadata: Map::new(),
            stuff: Map::new(),
            fetch_params: FetchParams::default(),
            state: ContextState::default(),
            token: CorrelationToken::new(),
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: CorrelationToken) -> Self {
        self.token = token;
        self
    }

    #[must_use]
    pub fn with_session(mut self, session: Map<String, Value>) -> Self {
        self.session = session;
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn fetch_params_input(&self) -> FetchParamsInput<'_> {
        FetchParamsInput {
            text: &self.artifact.text,
            hash: &self.artifact.hash,
            artifact: &self.artifact,
            policy: self.policy,
            variables: &self.variables,
            metadata: &self.metadata,
            session: &self.session,
            stuff: &self.stuff,
        }
    }
}
