//! Compiled, immutable representation of GraphQL documents.
//!
//! Artifacts are produced ahead of time by the code generator and only read by the client: the
//! operation text and its hash, the selection tree the normalized cache walks, and the
//! pagination and list operation metadata attached by `@paginate`, `@list` and friends.

mod hash;
mod list;
mod node_lookup;
mod pagination;
mod selection;

use serde::{Deserialize, Serialize};

pub use self::{
    hash::operation_hash,
    list::{ListAction, ListOperation, ListPosition},
    node_lookup::{LookupArgument, NodeLookup},
    pagination::{FieldPagination, PaginationInfo, PaginationStrategy},
    selection::{Argument, FieldSelection, SelectionSet, Variables},
};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString, strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ArtifactKind {
    Query,
    Mutation,
    Subscription,
    Fragment,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum CachePolicy {
    #[default]
    CacheFirst,
    CacheAndNetwork,
    NetworkOnly,
    CacheOnly,
    /// Always goes to the network and never writes the result into the cache.
    NoCache,
}

impl CachePolicy {
    pub fn reads_cache(self) -> bool {
        matches!(
            self,
            CachePolicy::CacheFirst | CachePolicy::CacheAndNetwork | CachePolicy::CacheOnly
        )
    }

    pub fn writes_cache(self) -> bool {
        self != CachePolicy::NoCache
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentArtifact {
    pub name: String,
    pub kind: ArtifactKind,
    /// Document text, including the fragments it spreads.
    pub text: String,
    /// Filled in by the code generator; computed from `text` when empty.
    #[serde(default)]
    pub hash: String,
    /// `Query`, `Mutation`, `Subscription` or the type condition of a fragment.
    pub root_type: String,
    pub selection: SelectionSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<CachePolicy>,
}

impl DocumentArtifact {
    pub fn new(
        name: impl Into<String>,
        kind: ArtifactKind,
        text: impl Into<String>,
        root_type: impl Into<String>,
        selection: SelectionSet,
    ) -> Self {
        let text = text.into();

        DocumentArtifact {
            name: name.into(),
            kind,
            hash: operation_hash(&text),
            text,
            root_type: root_type.into(),
            selection,
            pagination: None,
            policy: None,
        }
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let mut artifact: DocumentArtifact = serde_json::from_str(json)?;

        if artifact.hash.is_empty() {
            artifact.hash = operation_hash(&artifact.text);
        }

        Ok(artifact)
    }

    #[must_use]
    pub fn with_pagination(mut self, pagination: PaginationInfo) -> Self {
        self.pagination = Some(pagination);
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// The field carrying `@paginate`, found by following the pagination path.
    pub fn paginated_field(&self) -> Option<&FieldSelection> {
        let pagination = self.pagination.as_ref()?;
        let (last, parents) = pagination.path.split_last()?;

        let mut selection = &self.selection;
        for key in parents {
            selection = selection.field(key)?.selection.as_ref()?;
        }

        selection.field(last).filter(|field| field.pagination.is_some())
    }
}
