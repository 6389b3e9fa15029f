use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{FieldPagination, ListOperation};

pub type Variables = Map<String, Value>;

/// The fields selected on one object, keyed by response key (the alias if any).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionSet {
    #[serde(default)]
    pub fields: IndexMap<String, FieldSelection>,
    /// Fields only selected when the object's `__typename` matches the key.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub abstract_fields: IndexMap<String, IndexMap<String, FieldSelection>>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_field(mut self, response_key: impl Into<String>, field: FieldSelection) -> Self {
        self.fields.insert(response_key.into(), field);
        self
    }

    #[must_use]
    pub fn with_abstract_field(
        mut self,
        typename: impl Into<String>,
        response_key: impl Into<String>,
        field: FieldSelection,
    ) -> Self {
        self.abstract_fields
            .entry(typename.into())
            .or_default()
            .insert(response_key.into(), field);
        self
    }

    /// Fields that apply to an object of the given type, in selection order. Type specific
    /// fields come after the common ones and never repeat a response key.
    pub fn fields_for<'a>(&'a self, typename: Option<&str>) -> impl Iterator<Item = (&'a str, &'a FieldSelection)> + 'a {
        let specific = typename
            .and_then(|typename| self.abstract_fields.get(typename))
            .into_iter()
            .flat_map(|fields| fields.iter())
            .filter(|(key, _)| !self.fields.contains_key(key.as_str()));

        self.fields
            .iter()
            .chain(specific)
            .map(|(key, field)| (key.as_str(), field))
    }

    pub fn field(&self, response_key: &str) -> Option<&FieldSelection> {
        self.fields.get(response_key)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.abstract_fields.is_empty()
    }
}

/// An argument as written in the document: either bound to an operation variable or inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Argument {
    Variable(String),
    Literal(Value),
}

impl Argument {
    pub fn variable(name: impl Into<String>) -> Self {
        Argument::Variable(name.into())
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Argument::Literal(value.into())
    }

    /// The value of the argument for one invocation. Unset variables resolve to nothing.
    pub fn resolve(&self, variables: &Variables) -> Option<Value> {
        match self {
            Argument::Variable(name) => variables.get(name).cloned(),
            Argument::Literal(value) => Some(value.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSelection {
    /// Schema name of the field, as opposed to its response key.
    pub name: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub arguments: IndexMap<String, Argument>,
    /// The field returns a list of `selection` (or of scalars).
    #[serde(default)]
    pub list: bool,
    /// Sub-selection for object fields, absent for scalars.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<SelectionSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<FieldPagination>,
    /// Name given with `@list(name: ..)` on a field that isn't paginated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operations: Vec<ListOperation>,
}

impl FieldSelection {
    pub fn scalar(name: impl Into<String>) -> Self {
        FieldSelection {
            name: name.into(),
            arguments: IndexMap::new(),
            list: false,
            selection: None,
            pagination: None,
            list_name: None,
            operations: Vec::new(),
        }
    }

    pub fn object(name: impl Into<String>, selection: SelectionSet) -> Self {
        FieldSelection {
            selection: Some(selection),
            ..Self::scalar(name)
        }
    }

    #[must_use]
    pub fn list(mut self) -> Self {
        self.list = true;
        self
    }

    #[must_use]
    pub fn with_argument(mut self, name: impl Into<String>, argument: Argument) -> Self {
        self.arguments.insert(name.into(), argument);
        self
    }

    #[must_use]
    pub fn with_pagination(mut self, pagination: FieldPagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    #[must_use]
    pub fn with_list_name(mut self, name: impl Into<String>) -> Self {
        self.list_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_operation(mut self, operation: ListOperation) -> Self {
        self.operations.push(operation);
        self
    }

    /// Name under which the list held by this field can be targeted by list operations.
    pub fn list_name(&self) -> Option<&str> {
        self.pagination
            .as_ref()
            .and_then(|pagination| pagination.operation_name.as_deref())
            .or(self.list_name.as_deref())
    }

    /// Whether the cache keeps this field as a list field state rather than a plain value.
    pub fn is_list_field(&self) -> bool {
        self.pagination.is_some() || self.list_name.is_some()
    }

    pub fn argument_value(&self, name: &str, variables: &Variables) -> Option<Value> {
        self.arguments.get(name)?.resolve(variables)
    }

    /// The variable an argument is bound to, if it's bound to one.
    pub fn argument_variable(&self, name: &str) -> Option<&str> {
        match self.arguments.get(name)? {
            Argument::Variable(variable) => Some(variable),
            Argument::Literal(_) => None,
        }
    }

    /// Key of the field inside its record: the field name qualified by its argument values,
    /// e.g. `friends(filter: "all")`. Arguments are sorted so the key doesn't depend on the order
    /// they were written in. The page arguments of a paginated field are left out, every page
    /// lands in the same list.
    pub fn storage_key(&self, variables: &Variables) -> String {
        let mut arguments = self
            .arguments
            .iter()
            .filter(|(name, _)| {
                !self
                    .pagination
                    .as_ref()
                    .is_some_and(|pagination| pagination.is_page_argument(name))
            })
            .filter_map(|(name, argument)| Some((name.as_str(), argument.resolve(variables)?)))
            .collect::<Vec<_>>();

        if arguments.is_empty() {
            return self.name.clone();
        }

        arguments.sort_by(|(left, _), (right, _)| left.cmp(right));

        let arguments = arguments
            .into_iter()
            .map(|(name, value)| format!("{name}: {value}"))
            .collect::<Vec<_>>()
            .join(", ");

        format!("{}({arguments})", self.name)
    }
}
