//! Task collections accepted by `wait_for_all`.
//!
//! Anything implementing [`IntoTaskMap`] can be waited on: ordered or hashed
//! maps of handles, lists of handles (keyed by their stringified index), a
//! prepared [`TaskMap`], or dynamic JSON. Conversion returns `None` when the
//! input is not map-like.

use super::handle::{AsyncHandle, MaybeHandle};
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};

/// An ordered map from key to a handle or a plain value.
///
/// Plain values are accepted so that a malformed dependency is reported per
/// key instead of failing the whole collection.
pub struct TaskMap<T> {
    entries: IndexMap<String, MaybeHandle<T>>,
}

impl<T> TaskMap<T> {
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, entry: MaybeHandle<T>) {
        self.entries.insert(key.into(), entry);
    }

    /// Adds a plain (non-handle) value under `key`.
    pub fn with_value(mut self, key: impl Into<String>, value: T) -> Self {
        self.insert(key, MaybeHandle::Value(value));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub(crate) fn into_entries(self) -> IndexMap<String, MaybeHandle<T>> {
        self.entries
    }
}

impl<T: Clone + Send + 'static> TaskMap<T> {
    /// Adds a handle under `key`.
    pub fn with_handle(mut self, key: impl Into<String>, handle: AsyncHandle<T>) -> Self {
        self.insert(key, handle.into());
        self
    }
}

impl<T> Default for TaskMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, K: Into<String>> FromIterator<(K, MaybeHandle<T>)> for TaskMap<T> {
    fn from_iter<I: IntoIterator<Item = (K, MaybeHandle<T>)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Conversion into a [`TaskMap`].
pub trait IntoTaskMap {
    /// The value type the tasks fulfill with.
    type Output;

    /// Returns `None` when the input is not map-like.
    fn into_task_map(self) -> Option<TaskMap<Self::Output>>;
}

impl<T> IntoTaskMap for TaskMap<T> {
    type Output = T;

    fn into_task_map(self) -> Option<TaskMap<T>> {
        Some(self)
    }
}

impl<K, T> IntoTaskMap for IndexMap<K, AsyncHandle<T>>
where
    K: Into<String>,
    T: Clone + Send + 'static,
{
    type Output = T;

    fn into_task_map(self) -> Option<TaskMap<T>> {
        Some(self.into_iter().map(|(k, h)| (k, h.into())).collect())
    }
}

impl<K, T> IntoTaskMap for IndexMap<K, MaybeHandle<T>>
where
    K: Into<String>,
{
    type Output = T;

    fn into_task_map(self) -> Option<TaskMap<T>> {
        Some(self.into_iter().collect())
    }
}

impl<K, T> IntoTaskMap for HashMap<K, AsyncHandle<T>>
where
    K: Into<String>,
    T: Clone + Send + 'static,
{
    type Output = T;

    fn into_task_map(self) -> Option<TaskMap<T>> {
        Some(self.into_iter().map(|(k, h)| (k, h.into())).collect())
    }
}

impl<K, T> IntoTaskMap for BTreeMap<K, AsyncHandle<T>>
where
    K: Into<String>,
    T: Clone + Send + 'static,
{
    type Output = T;

    fn into_task_map(self) -> Option<TaskMap<T>> {
        Some(self.into_iter().map(|(k, h)| (k, h.into())).collect())
    }
}

impl<K, T> IntoTaskMap for Vec<(K, AsyncHandle<T>)>
where
    K: Into<String>,
    T: Clone + Send + 'static,
{
    type Output = T;

    fn into_task_map(self) -> Option<TaskMap<T>> {
        Some(self.into_iter().map(|(k, h)| (k, h.into())).collect())
    }
}

impl<T: Clone + Send + 'static> IntoTaskMap for Vec<AsyncHandle<T>> {
    type Output = T;

    fn into_task_map(self) -> Option<TaskMap<T>> {
        Some(indexed(self.into_iter().map(MaybeHandle::from)))
    }
}

impl<T> IntoTaskMap for Vec<MaybeHandle<T>> {
    type Output = T;

    fn into_task_map(self) -> Option<TaskMap<T>> {
        Some(indexed(self))
    }
}

impl<T: Clone + Send + 'static, const N: usize> IntoTaskMap for [AsyncHandle<T>; N] {
    type Output = T;

    fn into_task_map(self) -> Option<TaskMap<T>> {
        Some(indexed(self.into_iter().map(MaybeHandle::from)))
    }
}

/// Dynamic input: objects and arrays are map-like, their members are plain
/// values (and therefore not handles). Anything else is rejected.
impl IntoTaskMap for JsonValue {
    type Output = JsonValue;

    fn into_task_map(self) -> Option<TaskMap<JsonValue>> {
        match self {
            JsonValue::Object(fields) => Some(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, MaybeHandle::Value(v)))
                    .collect(),
            ),
            JsonValue::Array(items) => Some(indexed(items.into_iter().map(MaybeHandle::Value))),
            _ => None,
        }
    }
}

fn indexed<T>(items: impl IntoIterator<Item = MaybeHandle<T>>) -> TaskMap<T> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, entry)| (i.to_string(), entry))
        .collect()
}
