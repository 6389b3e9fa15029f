use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use operation_artifact::{ListPosition, SelectionSet, Variables};
use serde_json::Value;

use crate::{
    lists::{ListKey, ListRegistry},
    read::{read, ReadResult},
    write::{WriteError, WriteOutcome, Writer},
    EntityKey, EntityRecord, FieldValue, KeyConfig, ListFieldState,
};

pub type SubscriptionCallback = Arc<dyn Fn(ReadResult) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreSettings {
    /// Garbage collection ticks a record survives without any subscriber.
    pub default_lifetime: u32,
    pub default_list_position: ListPosition,
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            default_lifetime: 10,
            default_list_position: ListPosition::Last,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Tables {
    pub records: HashMap<EntityKey, EntityRecord>,
    pub lists: ListRegistry,
}

impl Tables {
    /// Removes a record and every reference to it. Returns the records that changed.
    pub fn evict(&mut self, key: &EntityKey) -> HashSet<EntityKey> {
        let mut changed = HashSet::new();

        if self.records.remove(key).is_some() {
            changed.insert(key.clone());
        }

        self.lists.forget_owner(key);

        for (owner, record) in &mut self.records {
            let scrubbed = record
                .fields
                .values_mut()
                .fold(false, |scrubbed, value| value.scrub(key) | scrubbed);

            if scrubbed {
                changed.insert(owner.clone());
            }
        }

        changed
    }
}

struct Subscription {
    root: EntityKey,
    selection: Arc<SelectionSet>,
    variables: Variables,
    /// Records read the last time, a write to any of them re-runs the read.
    keys: HashSet<EntityKey>,
    callback: SubscriptionCallback,
}

#[derive(Default)]
struct StoreInner {
    tables: Tables,
    subscriptions: HashMap<SubscriptionId, Subscription>,
    next_subscription: u64,
}

type Notification = (SubscriptionCallback, ReadResult);

impl StoreInner {
    fn notifications(&mut self, changed: &HashSet<EntityKey>) -> Vec<Notification> {
        if changed.is_empty() {
            return Vec::new();
        }

        let records = &self.tables.records;

        self.subscriptions
            .values_mut()
            .filter(|subscription| !subscription.keys.is_disjoint(changed))
            .map(|subscription| {
                let result = read(records, &subscription.root, &subscription.selection, &subscription.variables);
                subscription.keys.clone_from(&result.keys);
                (subscription.callback.clone(), result)
            })
            .collect()
    }
}

/// The normalized cache: one record per entity identity, plus the root record holding
/// top-level fields.
///
/// All operations are atomic with respect to each other. Subscribers are called after the
/// internal lock is released, so callbacks may use the store.
pub struct Store {
    keys: KeyConfig,
    settings: StoreSettings,
    inner: Mutex<StoreInner>,
    /// Lists with a page load in flight.
    loading: Mutex<HashSet<ListKey>>,
}

/// Held while a page of a list loads, see [`Store::begin_page_load`].
pub struct PageLoadGuard<'a> {
    loading: &'a Mutex<HashSet<ListKey>>,
    key: ListKey,
}

impl Drop for PageLoadGuard<'_> {
    fn drop(&mut self) {
        lock(self.loading).remove(&self.key);
    }
}

impl Default for Store {
    fn default() -> Self {
        Store::new(KeyConfig::default(), StoreSettings::default())
    }
}

impl Store {
    pub fn new(keys: KeyConfig, settings: StoreSettings) -> Self {
        Store {
            keys,
            settings,
            inner: Mutex::new(StoreInner::default()),
            loading: Mutex::new(HashSet::new()),
        }
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    pub fn key_config(&self) -> &KeyConfig {
        &self.keys
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        lock(&self.inner)
    }

    /// Normalizes a response into the store and notifies affected subscribers.
    pub fn write(&self, root: &EntityKey, selection: &SelectionSet, data: &Value, variables: &Variables) -> WriteOutcome {
        let (outcome, notifications) = {
            let mut inner = self.lock();
            let mut writer = Writer::new(&mut inner.tables, &self.keys, variables, self.settings.default_list_position);

            match data.as_object() {
                Some(object) => writer.write_record(root, selection, object),
                None => writer.fail(WriteError::UnexpectedShape {
                    path: String::new(),
                    expected: "an object",
                }),
            }

            let outcome = writer.finish();
            let notifications = inner.notifications(&outcome.changed);
            (outcome, notifications)
        };

        tracing::debug!(
            root = %root,
            changed = outcome.changed.len(),
            errors = outcome.errors.len(),
            subscribers = notifications.len(),
            "Cache write"
        );

        dispatch(notifications);
        outcome
    }

    pub fn read(&self, root: &EntityKey, selection: &SelectionSet, variables: &Variables) -> ReadResult {
        let inner = self.lock();
        read(&inner.tables.records, root, selection, variables)
    }

    /// Calls `callback` with fresh data whenever a record the selection depends on changes.
    pub fn subscribe(
        &self,
        root: EntityKey,
        selection: Arc<SelectionSet>,
        variables: Variables,
        callback: SubscriptionCallback,
    ) -> SubscriptionId {
        let mut inner = self.lock();

        let keys = read(&inner.tables.records, &root, &selection, &variables).keys;
        let id = SubscriptionId(inner.next_subscription);
        inner.next_subscription += 1;

        inner.subscriptions.insert(
            id,
            Subscription {
                root,
                selection,
                variables,
                keys,
                callback,
            },
        );

        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.lock().subscriptions.remove(&id).is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscriptions.len()
    }

    /// Removes a record, drops it from every list and nulls references to it.
    pub fn evict(&self, key: &EntityKey) -> bool {
        let (changed, notifications) = {
            let mut inner = self.lock();
            let changed = inner.tables.evict(key);
            let notifications = inner.notifications(&changed);
            (changed, notifications)
        };

        dispatch(notifications);
        !changed.is_empty()
    }

    /// Ages every record nobody subscribes to and removes those past the configured lifetime.
    /// Returns the number of removed records.
    pub fn collect_garbage(&self) -> usize {
        let mut inner = self.lock();

        let covered: HashSet<EntityKey> = inner
            .subscriptions
            .values()
            .flat_map(|subscription| subscription.keys.iter().cloned())
            .collect();

        let lifetime = self.settings.default_lifetime;
        let mut expired = Vec::new();

        for (key, record) in &mut inner.tables.records {
            if *key == EntityKey::Root || covered.contains(key) {
                record.age = 0;
                continue;
            }

            record.age += 1;

            if record.age > lifetime {
                expired.push(key.clone());
            }
        }

        for key in &expired {
            inner.tables.records.remove(key);
            inner.tables.lists.forget_owner(key);
        }

        if !expired.is_empty() {
            tracing::debug!(removed = expired.len(), "Cache garbage collection");
        }

        expired.len()
    }

    pub fn record(&self, key: &EntityKey) -> Option<EntityRecord> {
        self.lock().tables.records.get(key).cloned()
    }

    pub fn contains(&self, key: &EntityKey) -> bool {
        self.lock().tables.records.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().tables.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Location of the list field found by following `path` (response keys) from `root`.
    /// Documents reaching the same list through different paths get the same key.
    pub fn list_key(
        &self,
        root: &EntityKey,
        selection: &SelectionSet,
        variables: &Variables,
        path: &[String],
    ) -> Option<ListKey> {
        let inner = self.lock();
        locate_list(&inner.tables, root, selection, variables, path)
    }

    /// State of the list field found by following `path` (response keys) from `root`.
    pub fn list_state(
        &self,
        root: &EntityKey,
        selection: &SelectionSet,
        variables: &Variables,
        path: &[String],
    ) -> Option<ListFieldState> {
        let inner = self.lock();
        let key = locate_list(&inner.tables, root, selection, variables, path)?;

        inner
            .tables
            .records
            .get(&key.record)?
            .field(&key.field)
            .and_then(FieldValue::as_list_field)
            .cloned()
    }

    /// Marks a page load of the list as in flight until the guard is dropped. `None` while
    /// another load of the same list is in flight, whoever started it.
    pub fn begin_page_load(&self, key: ListKey) -> Option<PageLoadGuard<'_>> {
        lock(&self.loading).insert(key.clone()).then(|| PageLoadGuard {
            loading: &self.loading,
            key,
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn locate_list(
    tables: &Tables,
    root: &EntityKey,
    selection: &SelectionSet,
    variables: &Variables,
    path: &[String],
) -> Option<ListKey> {
    let (last, parents) = path.split_last()?;

    let mut key = root.clone();
    let mut selection = selection;

    for response_key in parents {
        let field = selection.field(response_key)?;
        let value = tables.records.get(&key)?.field(&field.storage_key(variables))?;
        key = value.as_reference()?.clone();
        selection = field.selection.as_ref()?;
    }

    let field = selection.field(last)?;

    Some(ListKey {
        record: key,
        field: field.storage_key(variables),
    })
}

fn dispatch(notifications: Vec<Notification>) {
    for (callback, result) in notifications {
        callback(result);
    }
}
