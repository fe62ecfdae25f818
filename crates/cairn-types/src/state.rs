//! State payloads carried by every state item.
//!
//! A [`StateMap`] is a string-keyed JSON object. Items keep all of their
//! persistent data in one, which is what makes the structured state dump
//! possible. Access goes through explicit accessors so that scripting layers
//! sitting above the kernel get a catchable [`StateKeyError`] for a missing
//! or mistyped key instead of a panic.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Errors from typed access into a [`StateMap`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateKeyError {
    /// The key is not present in the state.
    #[error("no such state key: {key}")]
    NoSuchKey {
        /// The requested key.
        key: String,
    },

    /// The key is present but holds a value of a different JSON type.
    #[error("state key {key} is not a {expected}")]
    WrongType {
        /// The requested key.
        key: String,
        /// The JSON type the caller asked for.
        expected: &'static str,
    },
}

/// The data payload of a state item.
///
/// Cloning a `StateMap` copies the whole tree; no substructure is shared
/// between the clone and the original.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateMap(Map<String, Value>);

impl StateMap {
    /// Create an empty state.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Borrow the underlying JSON object.
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consume the state and return the underlying JSON object.
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Whether `key` is present.
    pub fn has_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Look up `key`.
    pub fn get(&self, key: &str) -> Result<&Value, StateKeyError> {
        self.0.get(key).ok_or_else(|| StateKeyError::NoSuchKey {
            key: key.to_owned(),
        })
    }

    /// Look up `key` for in-place modification.
    pub fn get_mut(&mut self, key: &str) -> Result<&mut Value, StateKeyError> {
        self.0.get_mut(key).ok_or_else(|| StateKeyError::NoSuchKey {
            key: key.to_owned(),
        })
    }

    /// Insert or replace `key`, returning the previous value if there was one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Remove `key`, returning its value if there was one.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Read `key` as a non-negative integer.
    pub fn get_u64(&self, key: &str) -> Result<u64, StateKeyError> {
        self.get(key)?
            .as_u64()
            .ok_or_else(|| wrong_type(key, "non-negative integer"))
    }

    /// Read `key` as a signed integer.
    pub fn get_i64(&self, key: &str) -> Result<i64, StateKeyError> {
        self.get(key)?
            .as_i64()
            .ok_or_else(|| wrong_type(key, "integer"))
    }

    /// Read `key` as a string.
    pub fn get_str(&self, key: &str) -> Result<&str, StateKeyError> {
        self.get(key)?
            .as_str()
            .ok_or_else(|| wrong_type(key, "string"))
    }

    /// Read `key` as a boolean.
    pub fn get_bool(&self, key: &str) -> Result<bool, StateKeyError> {
        self.get(key)?
            .as_bool()
            .ok_or_else(|| wrong_type(key, "boolean"))
    }

    /// Read `key` as an array.
    pub fn get_array(&self, key: &str) -> Result<&Vec<Value>, StateKeyError> {
        self.get(key)?
            .as_array()
            .ok_or_else(|| wrong_type(key, "array"))
    }

    /// Iterate over keys in map order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Number of top-level keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the state has no keys at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn wrong_type(key: &str, expected: &'static str) -> StateKeyError {
    StateKeyError::WrongType {
        key: key.to_owned(),
        expected,
    }
}

impl From<Map<String, Value>> for StateMap {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<StateMap> for Value {
    fn from(state: StateMap) -> Self {
        Self::Object(state.0)
    }
}

impl TryFrom<Value> for StateMap {
    type Error = StateKeyError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            _ => Err(wrong_type("<root>", "object")),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for StateMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
