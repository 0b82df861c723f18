//! Step collections accepted by `exec_async`.
//!
//! A [`StepMap`] is an ordered list of named steps. Each step receives the
//! results of every step that ran before it and returns a [`StepOutput`]: a
//! plain JSON value, an [`ErrorValue`], or a handle that settles later.

use super::error::{ErrorValue, IntoFailure};
use super::handle::{AsyncHandle, MaybeHandle};
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use std::fmt;

/// Results accumulated by a step chain, in execution order.
pub type StepResults = IndexMap<String, JsonValue>;

/// A boxed step function.
pub type StepFn = Box<dyn FnOnce(&StepResults) -> StepOutput + Send>;

/// The value a step produces: data, or an error that fails the chain.
#[derive(Debug, Clone, PartialEq)]
pub enum StepValue {
    Data(JsonValue),
    Error(ErrorValue),
}

impl StepValue {
    /// The failure predicate used by `exec_async`.
    pub fn is_error(&self) -> bool {
        matches!(self, StepValue::Error(_))
    }
}

impl IntoFailure for StepValue {
    fn into_failure(self) -> ErrorValue {
        match self {
            StepValue::Data(value) => value.into_failure(),
            StepValue::Error(error) => error,
        }
    }
}

impl From<JsonValue> for StepValue {
    fn from(value: JsonValue) -> Self {
        StepValue::Data(value)
    }
}

impl From<ErrorValue> for StepValue {
    fn from(error: ErrorValue) -> Self {
        StepValue::Error(error)
    }
}

/// What a step function returns.
pub struct StepOutput(MaybeHandle<StepValue>);

impl StepOutput {
    pub(crate) fn into_inner(self) -> MaybeHandle<StepValue> {
        self.0
    }
}

impl From<StepValue> for StepOutput {
    fn from(value: StepValue) -> Self {
        StepOutput(MaybeHandle::Value(value))
    }
}

impl From<JsonValue> for StepOutput {
    fn from(value: JsonValue) -> Self {
        StepValue::Data(value).into()
    }
}

impl From<ErrorValue> for StepOutput {
    fn from(error: ErrorValue) -> Self {
        StepValue::Error(error).into()
    }
}

impl From<Result<JsonValue, ErrorValue>> for StepOutput {
    fn from(result: Result<JsonValue, ErrorValue>) -> Self {
        match result {
            Ok(value) => value.into(),
            Err(error) => error.into(),
        }
    }
}

impl From<AsyncHandle<StepValue>> for StepOutput {
    fn from(handle: AsyncHandle<StepValue>) -> Self {
        StepOutput(handle.into())
    }
}

impl From<AsyncHandle<JsonValue>> for StepOutput {
    fn from(handle: AsyncHandle<JsonValue>) -> Self {
        handle.map(StepValue::Data).into()
    }
}

impl From<MaybeHandle<StepValue>> for StepOutput {
    fn from(entry: MaybeHandle<StepValue>) -> Self {
        StepOutput(entry)
    }
}

/// One entry of a step map.
pub enum StepEntry {
    Step(StepFn),
    /// A value that was declared where a step function was expected.
    NotCallable(JsonValue),
}

impl fmt::Debug for StepEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepEntry::Step(_) => f.write_str("Step(..)"),
            StepEntry::NotCallable(value) => f.debug_tuple("NotCallable").field(value).finish(),
        }
    }
}

/// An ordered map of named steps. Insertion order is execution order.
///
/// # Examples
///
/// ```
/// use exec_toolkit::execution::StepMap;
/// use serde_json::json;
///
/// let steps = StepMap::new()
///     .step("a", |_| json!(1))
///     .step("b", |results| json!(results["a"].as_i64().unwrap_or(0) + 1));
///
/// assert_eq!(steps.keys().collect::<Vec<_>>(), vec!["a", "b"]);
/// ```
#[derive(Debug, Default)]
pub struct StepMap {
    entries: IndexMap<String, StepEntry>,
}

impl StepMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a step.
    pub fn step<F, R>(mut self, key: impl Into<String>, step: F) -> Self
    where
        F: FnOnce(&StepResults) -> R + Send + 'static,
        R: Into<StepOutput>,
    {
        self.insert_step(key, step);
        self
    }

    pub fn insert_step<F, R>(&mut self, key: impl Into<String>, step: F)
    where
        F: FnOnce(&StepResults) -> R + Send + 'static,
        R: Into<StepOutput>,
    {
        self.entries.insert(
            key.into(),
            StepEntry::Step(Box::new(move |results| step(results).into())),
        );
    }

    /// Declares a non-callable entry; running the chain fails at this key.
    pub fn insert_value(&mut self, key: impl Into<String>, value: JsonValue) {
        self.entries.insert(key.into(), StepEntry::NotCallable(value));
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

    pub(crate) fn into_entries(self) -> IndexMap<String, StepEntry> {
        self.entries
    }
}

/// Conversion into a [`StepMap`]. Returns `None` when the input is not
/// map-like.
pub trait IntoStepMap {
    fn into_step_map(self) -> Option<StepMap>;
}

impl IntoStepMap for StepMap {
    fn into_step_map(self) -> Option<StepMap> {
        Some(self)
    }
}

/// Dynamic input: an object maps to non-callable entries, anything else is
/// not map-like.
impl IntoStepMap for JsonValue {
    fn into_step_map(self) -> Option<StepMap> {
        match self {
            JsonValue::Object(fields) => {
                let mut steps = StepMap::new();
                for (key, value) in fields {
                    steps.insert_value(key, value);
                }
                Some(steps)
            }
            _ => None,
        }
    }
}
