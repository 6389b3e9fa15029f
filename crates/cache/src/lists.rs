use std::collections::HashMap;

use indexmap::IndexSet;

use crate::EntityKey;

/// Location of a list field state: the record owning it and the field's storage key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListKey {
    pub record: EntityKey,
    pub field: String,
}

/// Named lists (`@list(name: ..)`, `@paginate(name: ..)`) seen so far, so list operations carried
/// by mutation responses can find them.
#[derive(Debug, Default)]
pub(crate) struct ListRegistry {
    by_name: HashMap<String, IndexSet<ListKey>>,
}

impl ListRegistry {
    pub fn register(&mut self, name: &str, key: ListKey) {
        self.by_name.entry(name.to_string()).or_default().insert(key);
    }

    /// Lists registered under `name`, restricted to the one owned by `parent` if given.
    pub fn targets(&self, name: &str, parent: Option<&EntityKey>) -> Vec<ListKey> {
        self.by_name
            .get(name)
            .into_iter()
            .flatten()
            .filter(|key| parent.is_none() || parent == Some(&key.record))
            .cloned()
            .collect()
    }

    pub fn forget_owner(&mut self, owner: &EntityKey) {
        for keys in self.by_name.values_mut() {
            keys.retain(|key| key.record != *owner);
        }
    }
}
