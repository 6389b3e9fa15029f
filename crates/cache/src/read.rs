use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use operation_artifact::{FieldSelection, SelectionSet, Variables};
use serde_json::{Map, Value};

use crate::{
    pagination::{ListEntry, ListFieldState, PageInfo},
    EntityKey, EntityRecord, FieldValue,
};

/// Data assembled from the store for a selection.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadResult {
    pub data: Value,
    /// Some selected field (or referenced record) is missing from the store.
    pub partial: bool,
    /// Every record the data was read from.
    pub keys: HashSet<EntityKey>,
}

pub(crate) fn read(
    records: &HashMap<EntityKey, EntityRecord>,
    root: &EntityKey,
    selection: &SelectionSet,
    variables: &Variables,
) -> ReadResult {
    let mut reader = Reader {
        records,
        variables,
        keys: HashSet::new(),
        partial: false,
    };

    let data = reader.record(root, selection);

    ReadResult {
        data,
        partial: reader.partial,
        keys: reader.keys,
    }
}

struct Reader<'a> {
    records: &'a HashMap<EntityKey, EntityRecord>,
    variables: &'a Variables,
    keys: HashSet<EntityKey>,
    partial: bool,
}

impl Reader<'_> {
    fn record(&mut self, key: &EntityKey, selection: &SelectionSet) -> Value {
        self.keys.insert(key.clone());

        let Some(record) = self.records.get(key) else {
            self.partial = true;
            return Value::Null;
        };

        self.object(selection, record.typename(), &record.fields)
    }

    fn object(&mut self, selection: &SelectionSet, typename: Option<&str>, fields: &IndexMap<String, FieldValue>) -> Value {
        let mut object = Map::new();

        for (response_key, field) in selection.fields_for(typename) {
            let value = match fields.get(&field.storage_key(self.variables)) {
                Some(value) => self.value(field, value),
                None => {
                    self.partial = true;
                    Value::Null
                }
            };

            object.insert(response_key.to_string(), value);
        }

        Value::Object(object)
    }

    fn value(&mut self, field: &FieldSelection, value: &FieldValue) -> Value {
        match value {
            FieldValue::Null => Value::Null,
            FieldValue::Scalar(value) => value.clone(),
            FieldValue::Reference(key) => match &field.selection {
                Some(selection) => self.record(key, selection),
                None => Value::String(key.to_string()),
            },
            FieldValue::Object(fields) => {
                let typename = match fields.get("__typename") {
                    Some(FieldValue::Scalar(Value::String(typename))) => Some(typename.as_str()),
                    _ => None,
                };

                match &field.selection {
                    Some(selection) => self.object(selection, typename, fields),
                    None => Value::Null,
                }
            }
            FieldValue::List(items) => Value::Array(items.iter().map(|item| self.value(field, item)).collect()),
            FieldValue::ListField(state) => self.list(field, state),
        }
    }

    fn list(&mut self, field: &FieldSelection, state: &ListFieldState) -> Value {
        let Some(selection) = &field.selection else {
            return Value::Null;
        };

        if !state.strategy.is_some_and(|strategy| strategy.is_cursor()) {
            return Value::Array(state.entries.iter().map(|entry| self.value(field, &entry.node)).collect());
        }

        let mut connection = Map::new();

        for (response_key, field) in selection.fields_for(None) {
            let value = match field.name.as_str() {
                "edges" => Value::Array(state.entries.iter().map(|entry| self.edge(field, entry)).collect()),
                "pageInfo" => page_info(field.selection.as_ref(), &state.page_info),
                _ => match state.extra.get(&field.storage_key(self.variables)) {
                    Some(value) => self.value(field, value),
                    None => {
                        self.partial = true;
                        Value::Null
                    }
                },
            };

            connection.insert(response_key.to_string(), value);
        }

        Value::Object(connection)
    }

    fn edge(&mut self, edges: &FieldSelection, entry: &ListEntry) -> Value {
        let mut edge = Map::new();

        let Some(selection) = &edges.selection else {
            return Value::Object(edge);
        };

        for (response_key, field) in selection.fields_for(None) {
            let value = match field.name.as_str() {
                "cursor" => entry.cursor.clone().map(Value::String).unwrap_or_default(),
                "node" => self.value(field, &entry.node),
                _ => match entry.edge_fields.get(&field.storage_key(self.variables)) {
                    Some(value) => self.value(field, value),
                    // Edges inserted by list operations carry no edge fields.
                    None => Value::Null,
                },
            };

            edge.insert(response_key.to_string(), value);
        }

        Value::Object(edge)
    }
}

fn page_info(selection: Option<&SelectionSet>, info: &PageInfo) -> Value {
    let Some(selection) = selection else {
        return Value::Null;
    };

    let all = match serde_json::to_value(info) {
        Ok(Value::Object(all)) => all,
        _ => Map::new(),
    };

    let object = selection
        .fields_for(None)
        .map(|(response_key, field)| {
            let value = match field.name.as_str() {
                "__typename" => Value::String("PageInfo".into()),
                name => all.get(name).cloned().unwrap_or_default(),
            };
            (response_key.to_string(), value)
        })
        .collect();

    Value::Object(object)
}
