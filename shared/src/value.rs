//! Store values
//!
//! Values read from the store arrive frozen: nested maps and lists are shared,
//! read-only `Arc`s. Anything re-published has to be unfrozen first.

use crate::path::Path;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Number, Value as JsonValue};
use std::sync::Arc;

/// Insertion-ordered key/value updates carried by a notification
pub type Updates = IndexMap<String, StoreValue>;

/// A value stored under a key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoreValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<StoreValue>),
    FrozenList(Arc<Vec<StoreValue>>),
    Map(Updates),
    FrozenMap(Arc<Updates>),
    /// Reference to another store path
    Pointer(Path),
}

impl StoreValue {
    /// Convert every map and list into its read-only form, recursively
    pub fn freeze(self) -> StoreValue {
        match self {
            StoreValue::Map(map) => StoreValue::FrozenMap(Arc::new(
                map.into_iter().map(|(k, v)| (k, v.freeze())).collect(),
            )),
            StoreValue::List(items) => StoreValue::FrozenList(Arc::new(
                items.into_iter().map(StoreValue::freeze).collect(),
            )),
            other => other,
        }
    }

    /// Convert every frozen map and list into a plain mutable one, recursively
    ///
    /// Strings and scalars (pointers included) are returned unchanged.
    pub fn unfreeze(self) -> StoreValue {
        match self {
            StoreValue::Map(map) => StoreValue::Map(unfreeze_updates(map)),
            StoreValue::FrozenMap(map) => {
                let map = Arc::try_unwrap(map).unwrap_or_else(|shared| (*shared).clone());
                StoreValue::Map(unfreeze_updates(map))
            }
            StoreValue::List(items) => {
                StoreValue::List(items.into_iter().map(StoreValue::unfreeze).collect())
            }
            StoreValue::FrozenList(items) => {
                let items = Arc::try_unwrap(items).unwrap_or_else(|shared| (*shared).clone());
                StoreValue::List(items.into_iter().map(StoreValue::unfreeze).collect())
            }
            scalar => scalar,
        }
    }

    /// True if this value or anything nested inside it is frozen
    pub fn contains_frozen(&self) -> bool {
        match self {
            StoreValue::FrozenMap(_) | StoreValue::FrozenList(_) => true,
            StoreValue::Map(map) => map.values().any(StoreValue::contains_frozen),
            StoreValue::List(items) => items.iter().any(StoreValue::contains_frozen),
            _ => false,
        }
    }

    /// Render as plain JSON: maps become objects, lists arrays, pointers path strings
    pub fn to_json(&self) -> JsonValue {
        match self {
            StoreValue::Null => JsonValue::Null,
            StoreValue::Bool(b) => JsonValue::Bool(*b),
            StoreValue::Int(i) => JsonValue::Number((*i).into()),
            StoreValue::Float(f) => Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            StoreValue::Str(s) => JsonValue::String(s.clone()),
            StoreValue::List(items) => JsonValue::Array(items.iter().map(Self::to_json).collect()),
            StoreValue::FrozenList(items) => {
                JsonValue::Array(items.iter().map(Self::to_json).collect())
            }
            StoreValue::Map(map) => updates_to_json(map),
            StoreValue::FrozenMap(map) => updates_to_json(map),
            StoreValue::Pointer(path) => JsonValue::String(path.to_string()),
        }
    }
}

/// Unfreeze every value of an updates map
pub fn unfreeze_updates(updates: Updates) -> Updates {
    updates
        .into_iter()
        .map(|(k, v)| (k, v.unfreeze()))
        .collect()
}

/// Render an updates map as a JSON object, preserving key order
pub fn updates_to_json(updates: &Updates) -> JsonValue {
    let mut object = JsonMap::new();
    for (key, value) in updates {
        object.insert(key.clone(), value.to_json());
    }
    JsonValue::Object(object)
}

impl From<&str> for StoreValue {
    fn from(s: &str) -> Self {
        StoreValue::Str(s.to_string())
    }
}

impl From<String> for StoreValue {
    fn from(s: String) -> Self {
        StoreValue::Str(s)
    }
}

impl From<i64> for StoreValue {
    fn from(i: i64) -> Self {
        StoreValue::Int(i)
    }
}

impl From<f64> for StoreValue {
    fn from(f: f64) -> Self {
        StoreValue::Float(f)
    }
}

impl From<bool> for StoreValue {
    fn from(b: bool) -> Self {
        StoreValue::Bool(b)
    }
}

impl From<Path> for StoreValue {
    fn from(path: Path) -> Self {
        StoreValue::Pointer(path)
    }
}

impl From<Updates> for StoreValue {
    fn from(map: Updates) -> Self {
        StoreValue::Map(map)
    }
}

impl From<Vec<StoreValue>> for StoreValue {
    fn from(items: Vec<StoreValue>) -> Self {
        StoreValue::List(items)
    }
}
