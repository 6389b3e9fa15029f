use std::collections::HashSet;

use indexmap::IndexMap;
use operation_artifact::{FieldSelection, ListAction, ListOperation, ListPosition, PaginationStrategy, SelectionSet, Variables};
use serde_json::{Map, Value};

use crate::{
    lists::ListKey,
    pagination::{ListEntry, ListFieldState, MergeMode, PageArguments, PageInfo},
    store::Tables,
    EntityKey, FieldValue, KeyConfig,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WriteError {
    #[error("`{typename}.{field}` can't identify a cache entity, only scalars can")]
    MalformedIdentity { typename: String, field: String },
    #[error("expected {expected} at `{path}`")]
    UnexpectedShape { path: String, expected: &'static str },
}

/// What a write did to the store.
#[derive(Debug, Default)]
pub struct WriteOutcome {
    /// Records with at least one field that changed.
    pub changed: HashSet<EntityKey>,
    /// Sub-objects that couldn't be written. The rest of the response was.
    pub errors: Vec<WriteError>,
}

pub(crate) struct Writer<'a> {
    tables: &'a mut Tables,
    keys: &'a KeyConfig,
    variables: &'a Variables,
    default_position: ListPosition,
    path: Vec<String>,
    outcome: WriteOutcome,
}

impl<'a> Writer<'a> {
    pub fn new(
        tables: &'a mut Tables,
        keys: &'a KeyConfig,
        variables: &'a Variables,
        default_position: ListPosition,
    ) -> Self {
        Writer {
            tables,
            keys,
            variables,
            default_position,
            path: Vec::new(),
            outcome: WriteOutcome::default(),
        }
    }

    pub fn finish(self) -> WriteOutcome {
        self.outcome
    }

    pub fn fail(&mut self, error: WriteError) {
        tracing::warn!(%error, "Skipping part of a response while writing it to the cache");
        self.outcome.errors.push(error);
    }

    pub fn write_record(&mut self, key: &EntityKey, selection: &SelectionSet, object: &Map<String, Value>) {
        let typename = object.get("__typename").and_then(Value::as_str);
        self.tables.records.entry(key.clone()).or_default().age = 0;

        for (response_key, field) in selection.fields_for(typename) {
            let Some(value) = object.get(response_key) else {
                continue;
            };

            self.path.push(response_key.to_string());
            let storage_key = field.storage_key(self.variables);

            let result = if field.is_list_field() {
                self.list_field(key, &storage_key, field, value)
            } else {
                self.field_value(field, value)
            };

            match result {
                Ok(value) => {
                    if let (Some(name), FieldValue::ListField(_)) = (field.list_name(), &value) {
                        self.tables.lists.register(
                            name,
                            ListKey {
                                record: key.clone(),
                                field: storage_key.clone(),
                            },
                        );
                    }

                    let operations_target = (!field.operations.is_empty()).then(|| value.clone());

                    if self.tables.records.entry(key.clone()).or_default().set(storage_key, value) {
                        self.outcome.changed.insert(key.clone());
                    }

                    if let Some(target) = operations_target {
                        for operation in &field.operations {
                            self.apply_operation(operation, &target);
                        }
                    }
                }
                Err(error) => self.fail(error),
            }

            self.path.pop();
        }
    }

    fn field_value(&mut self, field: &FieldSelection, value: &Value) -> Result<FieldValue, WriteError> {
        match &field.selection {
            _ if value.is_null() => Ok(FieldValue::Null),
            None => Ok(FieldValue::Scalar(value.clone())),
            Some(selection) if field.list => self.list_value(selection, value),
            Some(selection) => self.object_value(selection, value),
        }
    }

    /// Lists of objects, possibly nested. Items that can't be written are dropped.
    fn list_value(&mut self, selection: &SelectionSet, value: &Value) -> Result<FieldValue, WriteError> {
        match value {
            Value::Null => Ok(FieldValue::Null),
            Value::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    self.path.push(index.to_string());
                    match self.list_value(selection, item) {
                        Ok(value) => values.push(value),
                        Err(error) => self.fail(error),
                    }
                    self.path.pop();
                }
                Ok(FieldValue::List(values))
            }
            _ => self.object_value(selection, value),
        }
    }

    fn object_value(&mut self, selection: &SelectionSet, value: &Value) -> Result<FieldValue, WriteError> {
        let object = value.as_object().ok_or_else(|| self.unexpected("an object"))?;

        match self.keys.identify(object)? {
            Some(key) => {
                self.write_record(&key, selection, object);
                Ok(FieldValue::Reference(key))
            }
            None => Ok(FieldValue::Object(self.inline_object(selection, object))),
        }
    }

    fn inline_object(&mut self, selection: &SelectionSet, object: &Map<String, Value>) -> IndexMap<String, FieldValue> {
        let typename = object.get("__typename").and_then(Value::as_str);
        let mut fields = IndexMap::new();

        for (response_key, field) in selection.fields_for(typename) {
            let Some(value) = object.get(response_key) else {
                continue;
            };

            self.path.push(response_key.to_string());
            match self.field_value(field, value) {
                Ok(value) => {
                    fields.insert(field.storage_key(self.variables), value);
                }
                Err(error) => self.fail(error),
            }
            self.path.pop();
        }

        fields
    }

    fn list_field(
        &mut self,
        owner: &EntityKey,
        storage_key: &str,
        field: &FieldSelection,
        value: &Value,
    ) -> Result<FieldValue, WriteError> {
        if value.is_null() {
            return Ok(FieldValue::Null);
        }

        let selection = field
            .selection
            .as_ref()
            .ok_or_else(|| self.unexpected("a list of objects"))?;
        let strategy = field.pagination.as_ref().map(|pagination| pagination.strategy);
        let arguments = self.page_arguments(field);

        let (entries, page_info, extra) = if strategy.is_some_and(PaginationStrategy::is_cursor) {
            self.connection(selection, value)?
        } else {
            (self.items(selection, value)?, None, IndexMap::new())
        };

        let mut state = self
            .tables
            .records
            .get(owner)
            .and_then(|record| record.field(storage_key))
            .and_then(FieldValue::as_list_field)
            .filter(|state| state.strategy == strategy)
            .cloned()
            .unwrap_or_else(|| ListFieldState::new(strategy));

        let mode = MergeMode::from_arguments(strategy, &arguments);
        tracing::trace!(field = storage_key, ?mode, entries = entries.len(), "Merging list field");

        state.merge(mode, entries, page_info, arguments);

        if mode == MergeMode::Replace {
            state.extra = extra;
        } else {
            state.extra.extend(extra);
        }

        Ok(FieldValue::ListField(state))
    }

    fn page_arguments(&self, field: &FieldSelection) -> PageArguments {
        let Some(pagination) = &field.pagination else {
            return PageArguments::default();
        };

        let number = |name: &str| {
            field
                .argument_value(name, self.variables)
                .and_then(|value| value.as_u64())
                .map(|value| value as usize)
        };

        let strategy = pagination.strategy;

        PageArguments {
            page_size: number(&pagination.page_size_arg_name),
            cursor: strategy
                .is_cursor()
                .then(|| field.argument_value(strategy.position_argument(), self.variables))
                .flatten()
                .and_then(|value| value.as_str().map(str::to_owned)),
            offset: (strategy == PaginationStrategy::Offset)
                .then(|| number(strategy.position_argument()))
                .flatten(),
        }
    }

    #[allow(clippy::type_complexity)]
    fn connection(
        &mut self,
        selection: &SelectionSet,
        value: &Value,
    ) -> Result<(Vec<ListEntry>, Option<PageInfo>, IndexMap<String, FieldValue>), WriteError> {
        let object = value.as_object().ok_or_else(|| self.unexpected("a connection"))?;
        let typename = object.get("__typename").and_then(Value::as_str);

        let mut entries = Vec::new();
        let mut page_info = None;
        let mut extra = IndexMap::new();

        for (response_key, field) in selection.fields_for(typename) {
            let Some(value) = object.get(response_key) else {
                continue;
            };

            self.path.push(response_key.to_string());

            match field.name.as_str() {
                "edges" => {
                    let edges = value.as_array().map(Vec::as_slice).unwrap_or_default();
                    for (index, edge) in edges.iter().enumerate() {
                        self.path.push(index.to_string());
                        match self.edge(field.selection.as_ref(), edge) {
                            Ok(entry) => entries.push(entry),
                            Err(error) => self.fail(error),
                        }
                        self.path.pop();
                    }
                }
                "pageInfo" => match serde_json::from_value::<PageInfo>(value.clone()) {
                    Ok(info) => page_info = Some(info),
                    Err(_) => {
                        let error = self.unexpected("a page info object");
                        self.fail(error);
                    }
                },
                _ => match self.field_value(field, value) {
                    Ok(value) => {
                        extra.insert(field.storage_key(self.variables), value);
                    }
                    Err(error) => self.fail(error),
                },
            }

            self.path.pop();
        }

        Ok((entries, page_info, extra))
    }

    fn edge(&mut self, selection: Option<&SelectionSet>, edge: &Value) -> Result<ListEntry, WriteError> {
        let object = edge.as_object().ok_or_else(|| self.unexpected("an edge"))?;
        let mut entry = ListEntry::node(FieldValue::Null);

        let Some(selection) = selection else {
            return Ok(entry);
        };

        for (response_key, field) in selection.fields_for(None) {
            let Some(value) = object.get(response_key) else {
                continue;
            };

            match field.name.as_str() {
                "cursor" => entry.cursor = value.as_str().map(str::to_owned),
                "node" => entry.node = self.field_value(field, value)?,
                _ => {
                    let value = self.field_value(field, value)?;
                    entry.edge_fields.insert(field.storage_key(self.variables), value);
                }
            }
        }

        Ok(entry)
    }

    fn items(&mut self, selection: &SelectionSet, value: &Value) -> Result<Vec<ListEntry>, WriteError> {
        let items = value.as_array().ok_or_else(|| self.unexpected("a list"))?;
        let mut entries = Vec::with_capacity(items.len());

        for (index, item) in items.iter().enumerate() {
            self.path.push(index.to_string());
            match self.list_value(selection, item) {
                Ok(node) => entries.push(ListEntry::node(node)),
                Err(error) => self.fail(error),
            }
            self.path.pop();
        }

        Ok(entries)
    }

    fn apply_operation(&mut self, operation: &ListOperation, target: &FieldValue) {
        if operation.action == ListAction::Delete {
            let Some(typename) = operation.type_name.as_deref() else {
                tracing::warn!(list = %operation.list, "Delete operation without a type, ignoring it");
                return;
            };

            for id in scalar_ids(target) {
                let changed = self.tables.evict(&EntityKey::entity(typename, id));
                self.outcome.changed.extend(changed);
            }

            return;
        }

        let entities = references(target);
        if entities.is_empty() {
            return;
        }

        let parent = operation
            .parent
            .as_ref()
            .and_then(|parent| parent.resolve(self.variables))
            .and_then(|parent| parent.as_str().and_then(|key| key.parse::<EntityKey>().ok()));
        let position = operation.position.unwrap_or(self.default_position);

        for list in self.tables.lists.targets(&operation.list, parent.as_ref()) {
            let Some(FieldValue::ListField(state)) = self
                .tables
                .records
                .get_mut(&list.record)
                .and_then(|record| record.fields.get_mut(&list.field))
            else {
                continue;
            };

            let mut changed = false;
            for entity in &entities {
                let entry = || ListEntry::node(FieldValue::Reference((*entity).clone()));
                changed |= match operation.action {
                    ListAction::Insert => state.insert(entry(), position),
                    ListAction::Remove => state.remove(entity),
                    ListAction::Toggle if state.contains(entity) => state.remove(entity),
                    ListAction::Toggle => state.insert(entry(), position),
                    ListAction::Delete => false,
                };
            }

            tracing::debug!(list = %operation.list, action = %operation.action, owner = %list.record, changed, "Applied list operation");

            if changed {
                self.outcome.changed.insert(list.record);
            }
        }
    }

    fn unexpected(&self, expected: &'static str) -> WriteError {
        WriteError::UnexpectedShape {
            path: self.path.join("."),
            expected,
        }
    }
}

fn references(value: &FieldValue) -> Vec<&EntityKey> {
    match value {
        FieldValue::Reference(key) => vec![key],
        FieldValue::List(items) => items.iter().flat_map(references).collect(),
        _ => Vec::new(),
    }
}

fn scalar_ids(value: &FieldValue) -> Vec<String> {
    match value {
        FieldValue::Scalar(Value::String(id)) => vec![id.clone()],
        FieldValue::Scalar(Value::Number(id)) => vec![id.to_string()],
        FieldValue::Scalar(Value::Array(ids)) => ids
            .iter()
            .filter_map(|id| match id {
                Value::String(id) => Some(id.clone()),
                Value::Number(id) => Some(id.to_string()),
                _ => None,
            })
            .collect(),
        FieldValue::List(items) => items.iter().flat_map(scalar_ids).collect(),
        _ => Vec::new(),
    }
}
