use std::{collections::HashMap, fmt, str::FromStr};

use serde_json::{Map, Value};

use crate::WriteError;

pub const ROOT_KEY: &str = "_ROOT_";

/// Identity of a record in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKey {
    /// Holds the root fields of queries and mutations.
    Root,
    Entity { typename: String, id: String },
}

impl EntityKey {
    pub fn entity(typename: impl Into<String>, id: impl Into<String>) -> Self {
        EntityKey::Entity {
            typename: typename.into(),
            id: id.into(),
        }
    }

    pub fn typename(&self) -> Option<&str> {
        match self {
            EntityKey::Root => None,
            EntityKey::Entity { typename, .. } => Some(typename),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::Root => f.write_str(ROOT_KEY),
            EntityKey::Entity { typename, id } => write!(f, "{typename}:{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("`{0}` is not a cache key, expected `Typename:id`")]
pub struct InvalidKey(String);

impl FromStr for EntityKey {
    type Err = InvalidKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == ROOT_KEY {
            return Ok(EntityKey::Root);
        }

        match s.split_once(':') {
            Some((typename, id)) if !typename.is_empty() && !id.is_empty() => Ok(EntityKey::entity(typename, id)),
            _ => Err(InvalidKey(s.to_string())),
        }
    }
}

/// Which fields identify an object of a given type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyConfig {
    default_keys: Vec<String>,
    types: HashMap<String, Vec<String>>,
}

impl Default for KeyConfig {
    fn default() -> Self {
        KeyConfig {
            default_keys: vec!["id".to_string()],
            types: HashMap::new(),
        }
    }
}

impl KeyConfig {
    pub fn new(default_keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        KeyConfig {
            default_keys: default_keys.into_iter().map(Into::into).collect(),
            types: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_type_keys(mut self, typename: impl Into<String>, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.types
            .insert(typename.into(), keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn keys_for(&self, typename: &str) -> &[String] {
        self.types.get(typename).unwrap_or(&self.default_keys)
    }

    /// Computes the key of an object from its `__typename` and key fields.
    ///
    /// Objects missing either have no identity and are stored inline by their owner. Key fields
    /// holding lists or objects can't form an identity and are reported as errors.
    pub fn identify(&self, object: &Map<String, Value>) -> Result<Option<EntityKey>, WriteError> {
        let Some(typename) = object.get("__typename").and_then(Value::as_str) else {
            return Ok(None);
        };

        let keys = self.keys_for(typename);
        if keys.is_empty() {
            return Ok(None);
        }

        let mut parts = Vec::with_capacity(keys.len());

        for key in keys {
            match object.get(key) {
                None | Some(Value::Null) => return Ok(None),
                Some(Value::String(value)) => parts.push(value.clone()),
                Some(value @ (Value::Number(_) | Value::Bool(_))) => parts.push(value.to_string()),
                Some(Value::Array(_) | Value::Object(_)) => {
                    return Err(WriteError::MalformedIdentity {
                        typename: typename.to_string(),
                        field: key.clone(),
                    })
                }
            }
        }

        Ok(Some(EntityKey::entity(typename, parts.join(":"))))
    }
}
