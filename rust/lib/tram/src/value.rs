use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An immutable snapshot of the whole state tree: reducer key → sub-state.
///
/// Wraps the map in an `Arc`, so clones are cheap and every holder sees the
/// same data. A dispatch never edits a snapshot; it produces a new one.
#[derive(Clone, Default, PartialEq)]
pub struct StateTree {
    slices: Arc<BTreeMap<String, Value>>,
}

impl StateTree {
    /// Empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the slice stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.slices.get(key)
    }

    /// Check if a slice exists under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.slices.contains_key(key)
    }

    /// Slice keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.slices.keys().map(String::as_str)
    }

    /// Iterate over `(key, slice)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.slices.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// A new snapshot with `key` set to `value`. `self` is left untouched.
    pub fn with(&self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut slices = (*self.slices).clone();
        slices.insert(key.into(), value.into());
        Self::from(slices)
    }

    /// Check whether two snapshots share the same allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slices, &other.slices)
    }

    /// Render the tree as one JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.slices
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

impl From<BTreeMap<String, Value>> for StateTree {
    fn from(slices: BTreeMap<String, Value>) -> Self {
        Self {
            slices: Arc::new(slices),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for StateTree {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect::<BTreeMap<_, _>>()
            .into()
    }
}

impl std::fmt::Debug for StateTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.slices.iter()).finish()
    }
}

/// A state transition request, routed to every reducer.
///
/// Serialized as `{"type": "...", "payload": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

impl Action {
    /// Action without payload.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: Value::Null,
        }
    }

    /// Attach a payload.
    pub fn with_payload(mut self, payload: impl Into<Value>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Shorthand for `action.kind == kind`.
    pub fn is(&self, kind: &str) -> bool {
        self.kind == kind
    }
}

/// Unique handle for a store subscription, returned by
/// [`StateStore::subscribe`](crate::StateStore::subscribe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);
