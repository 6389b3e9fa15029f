use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    operation_hash, Argument, ArtifactKind, DocumentArtifact, FieldSelection, PaginationInfo, PaginationStrategy,
    SelectionSet, Variables,
};

/// How the owning entity of a paginated fragment is fetched again on its own.
/// Defaults to the `node(id: ID!)` convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeLookup {
    pub query_field: String,
    /// Argument name to the entity field providing its value.
    pub arguments: IndexMap<String, LookupArgument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupArgument {
    pub field: String,
    #[serde(rename = "type")]
    pub graphql_type: String,
}

impl Default for NodeLookup {
    fn default() -> Self {
        let mut arguments = IndexMap::new();
        arguments.insert(
            "id".to_string(),
            LookupArgument {
                field: "id".to_string(),
                graphql_type: "ID!".to_string(),
            },
        );

        NodeLookup {
            query_field: "node".to_string(),
            arguments,
        }
    }
}

impl NodeLookup {
    /// Lookup variables built from the fields of the entity. `None` when one of them is missing.
    pub fn variables(&self, entity: &Map<String, Value>) -> Option<Variables> {
        self.arguments
            .iter()
            .map(|(name, argument)| {
                let value = entity.get(&argument.field).filter(|value| !value.is_null())?;
                Some((name.clone(), value.clone()))
            })
            .collect()
    }
}

impl DocumentArtifact {
    /// Builds the standalone query used to load further pages of a paginated fragment:
    /// `query($id: ID!, ..) { node(id: $id) { ...Fragment } }`.
    ///
    /// Returns `None` for anything but a paginated fragment.
    pub fn node_lookup(&self, lookup: &NodeLookup) -> Option<DocumentArtifact> {
        if self.kind != ArtifactKind::Fragment {
            return None;
        }

        let pagination = self.pagination.as_ref()?;
        let field = self.paginated_field()?;
        let strategy = field.pagination.as_ref()?.strategy;

        let mut declarations = lookup
            .arguments
            .iter()
            .map(|(name, argument)| format!("${name}: {}", argument.graphql_type))
            .collect::<Vec<_>>();

        let page_size_arg = field.pagination.as_ref().map(|pagination| pagination.page_size_arg_name.as_str());
        let position_type = match strategy {
            PaginationStrategy::Offset => "Int",
            PaginationStrategy::CursorForward | PaginationStrategy::CursorBackward => "String",
        };

        if let Some(variable) = page_size_arg.and_then(|name| field.argument_variable(name)) {
            declarations.push(format!("${variable}: Int"));
        }

        if let Some(variable) = field.argument_variable(strategy.position_argument()) {
            declarations.push(format!("${variable}: {position_type}"));
        }

        let lookup_arguments = lookup
            .arguments
            .keys()
            .map(|name| format!("{name}: ${name}"))
            .collect::<Vec<_>>()
            .join(", ");

        let key_fields = lookup
            .arguments
            .values()
            .map(|argument| format!("    {}\n", argument.field))
            .collect::<String>();

        let name = format!("{}_Pagination_Query", self.name);
        let text = format!(
            "query {name}({declarations}) {{\n  {field}({lookup_arguments}) {{\n    __typename\n{key_fields}    ...{fragment}\n  }}\n}}\n\n{fragment_text}",
            declarations = declarations.join(", "),
            field = lookup.query_field,
            fragment = self.name,
            fragment_text = self.text.trim_end(),
        );

        let mut entity_selection = SelectionSet::new().with_field("__typename", FieldSelection::scalar("__typename"));
        for argument in lookup.arguments.values() {
            entity_selection = entity_selection.with_field(argument.field.clone(), FieldSelection::scalar(&argument.field));
        }
        for (key, field) in &self.selection.fields {
            entity_selection.fields.insert(key.clone(), field.clone());
        }
        entity_selection.abstract_fields = self.selection.abstract_fields.clone();

        let mut lookup_field = FieldSelection::object(lookup.query_field.clone(), entity_selection);
        for name in lookup.arguments.keys() {
            lookup_field = lookup_field.with_argument(name.clone(), Argument::variable(name.clone()));
        }

        let mut path = vec![lookup.query_field.clone()];
        path.extend(pagination.path.iter().cloned());

        Some(DocumentArtifact {
            hash: operation_hash(&text),
            name,
            kind: ArtifactKind::Query,
            text,
            root_type: "Query".to_string(),
            selection: SelectionSet::new().with_field(lookup.query_field.clone(), lookup_field),
            pagination: Some(PaginationInfo {
                path,
                page_size: pagination.page_size,
            }),
            policy: None,
        })
    }
}
