use indexmap::IndexMap;
use serde_json::Value;

use crate::{EntityKey, ListFieldState};

/// A field value as kept by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Scalar(Value),
    Reference(EntityKey),
    /// Object without identity, stored inline by its owner.
    Object(IndexMap<String, FieldValue>),
    List(Vec<FieldValue>),
    /// Paginated or `@list` field.
    ListField(ListFieldState),
}

impl FieldValue {
    pub fn as_reference(&self) -> Option<&EntityKey> {
        match self {
            FieldValue::Reference(key) => Some(key),
            _ => None,
        }
    }

    pub fn as_list_field(&self) -> Option<&ListFieldState> {
        match self {
            FieldValue::ListField(state) => Some(state),
            _ => None,
        }
    }

    /// Drops every reference to `key` found in lists, and nulls direct references.
    /// Returns whether anything changed.
    pub(crate) fn scrub(&mut self, key: &EntityKey) -> bool {
        match self {
            FieldValue::Reference(reference) if reference == key => {
                *self = FieldValue::Null;
                true
            }
            FieldValue::Object(fields) => fields.values_mut().fold(false, |changed, value| value.scrub(key) | changed),
            FieldValue::List(items) => {
                let before = items.len();
                items.retain(|item| item.as_reference() != Some(key));
                let nested = items.iter_mut().fold(false, |changed, item| item.scrub(key) | changed);
                nested || items.len() != before
            }
            FieldValue::ListField(state) => state.remove(key),
            FieldValue::Null | FieldValue::Scalar(_) | FieldValue::Reference(_) => false,
        }
    }
}

/// Normalized cache row for one identity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityRecord {
    pub fields: IndexMap<String, FieldValue>,
    /// Garbage collection ticks spent without any subscriber.
    pub(crate) age: u32,
}

impl EntityRecord {
    pub fn field(&self, storage_key: &str) -> Option<&FieldValue> {
        self.fields.get(storage_key)
    }

    pub fn typename(&self) -> Option<&str> {
        match self.fields.get("__typename")? {
            FieldValue::Scalar(Value::String(typename)) => Some(typename),
            _ => None,
        }
    }

    /// Sets a field and reports whether its value changed.
    pub(crate) fn set(&mut self, storage_key: String, value: FieldValue) -> bool {
        match self.fields.get(&storage_key) {
            Some(existing) if *existing == value => false,
            _ => {
                self.fields.insert(storage_key, value);
                true
            }
        }
    }
}
