use indexmap::IndexMap;
use operation_artifact::{LookupArgument, NodeLookup};

/// Per-type cache settings, under `[types.<Typename>]`.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TypeConfig {
    /// Fields identifying an entity of this type. Falls back to `default_keys`.
    pub keys: Option<Vec<String>>,
    /// How to fetch one entity of this type on its own, for fragment pagination.
    pub resolve: Option<ResolveConfig>,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolveConfig {
    /// Root query field returning the entity, e.g. `user`.
    pub query_field: String,
    /// Arguments of the query field, each read from a field of the entity.
    #[serde(default)]
    pub arguments: IndexMap<String, ResolveArgument>,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolveArgument {
    pub field: String,
    #[serde(rename = "type")]
    pub graphql_type: String,
}

impl From<&ResolveConfig> for NodeLookup {
    fn from(config: &ResolveConfig) -> Self {
        NodeLookup {
            query_field: config.query_field.clone(),
            arguments: config
                .arguments
                .iter()
                .map(|(name, argument)| {
                    let argument = LookupArgument {
                        field: argument.field.clone(),
                        graphql_type: argument.graphql_type.clone(),
                    };
                    (name.clone(), argument)
                })
                .collect(),
        }
    }
}
