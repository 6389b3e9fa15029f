use serde::{Deserialize, Serialize};

use crate::Argument;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ListAction {
    Insert,
    Remove,
    /// Removes the entity from the whole cache, not only from the list.
    Delete,
    Toggle,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ListPosition {
    #[serde(alias = "prepend")]
    First,
    #[default]
    #[serde(alias = "append")]
    Last,
}

/// A list mutation operation carried by a mutation field, e.g. `...All_Users_insert`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOperation {
    pub action: ListAction,
    /// Name of the targeted list, as declared with `@list(name: ..)` or `@paginate(name: ..)`.
    pub list: String,
    /// Falls back to the client's default position when missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<ListPosition>,
    /// Cache key (`Typename:id`) of the entity owning the targeted list. Without it every list
    /// registered under the name is targeted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Argument>,
    /// Type of the deleted entity, required by `delete` operations which only receive its id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
}

impl ListOperation {
    pub fn new(action: ListAction, list: impl Into<String>) -> Self {
        ListOperation {
            action,
            list: list.into(),
            position: None,
            parent: None,
            type_name: None,
        }
    }

    pub fn delete(type_name: impl Into<String>) -> Self {
        ListOperation {
            type_name: Some(type_name.into()),
            ..Self::new(ListAction::Delete, String::new())
        }
    }

    #[must_use]
    pub fn at(mut self, position: ListPosition) -> Self {
        self.position = Some(position);
        self
    }

    #[must_use]
    pub fn with_parent(mut self, parent: Argument) -> Self {
        self.parent = Some(parent);
        self
    }
}
