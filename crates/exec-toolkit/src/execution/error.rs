//! Error values carried by rejected handles.
//!
//! Every failure surfaced by this crate is an [`ErrorValue`]: a message, an
//! optional machine-readable code, an arbitrary JSON payload and a per-key map
//! of sub-errors. Aggregations use the payload for partial results and the map
//! for the error of each constituent task or step.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use std::fmt;
use thiserror::Error;

/// Stable classification of the failures produced by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A task collection, step collection or timeout was malformed.
    InvalidArguments,
    /// A declared dependency was a plain value instead of a handle.
    NotAHandle,
    /// The deadline elapsed while operations were still pending.
    Timeout,
    /// A step could not be run.
    StepFailure,
    /// One or more constituent operations of a fan-out failed.
    AggregateFailure,
}

impl ErrorKind {
    /// Returns the code stored in [`ErrorValue::code`] for this kind.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::InvalidArguments => "invalid_arguments",
            ErrorKind::NotAHandle => "not_a_handle",
            ErrorKind::Timeout => "timeout",
            ErrorKind::StepFailure => "step_failure",
            ErrorKind::AggregateFailure => "aggregate_failure",
        }
    }

    /// Parses a code back into its kind.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "invalid_arguments" => Some(ErrorKind::InvalidArguments),
            "not_a_handle" => Some(ErrorKind::NotAHandle),
            "timeout" => Some(ErrorKind::Timeout),
            "step_failure" => Some(ErrorKind::StepFailure),
            "aggregate_failure" => Some(ErrorKind::AggregateFailure),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A structured, immutable error record.
///
/// `ErrorValue` is used both as a leaf error and as a container aggregating
/// per-key sub-errors. It serializes to the JSON bag accepted by
/// [`ErrorValue::from_bag`], so an error can be stored inside another error's
/// payload.
///
/// # Examples
///
/// ```
/// use exec_toolkit::{ErrorKind, ErrorValue};
///
/// let error = ErrorValue::new("Upstream unavailable.")
///     .with_code("upstream")
///     .with_sub_error("users", ErrorValue::of_kind(ErrorKind::Timeout, "Timed out."));
///
/// assert_eq!(error.message(), "Upstream unavailable.");
/// assert!(error.error_map()["users"].is_kind(ErrorKind::Timeout));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{message}")]
#[serde(rename_all = "camelCase")]
pub struct ErrorValue {
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    code: Option<String>,
    #[serde(default)]
    data: JsonValue,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    error_map: IndexMap<String, ErrorValue>,
}

impl ErrorValue {
    /// Creates an error from a bare message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            data: JsonValue::Null,
            error_map: IndexMap::new(),
        }
    }

    /// Creates an error whose code is taken from `kind`.
    pub fn of_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::new(message).with_code(kind.code())
    }

    /// Builds an error from a structured `{code, message, data, errorMap}` bag.
    ///
    /// A bare JSON string becomes the message. Any other value that is not a
    /// bag is kept as the payload of a generic failure.
    pub fn from_bag(bag: &JsonValue) -> Self {
        match bag {
            JsonValue::String(message) => Self::new(message.clone()),
            JsonValue::Object(fields) if fields.contains_key("message") => {
                serde_json::from_value(bag.clone()).unwrap_or_else(|_| {
                    let message = fields
                        .get("message")
                        .and_then(JsonValue::as_str)
                        .unwrap_or("Unknown error.");
                    Self::new(message).with_data(bag.clone())
                })
            }
            other => Self::new("Failure value.").with_data(other.clone()),
        }
    }

    /// Sets the error code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Replaces the payload.
    pub fn with_data(mut self, data: JsonValue) -> Self {
        self.data = data;
        self
    }

    /// Replaces the map of sub-errors.
    pub fn with_error_map(mut self, error_map: IndexMap<String, ErrorValue>) -> Self {
        self.error_map = error_map;
        self
    }

    /// Adds (or replaces) a single sub-error.
    pub fn with_sub_error(mut self, key: impl Into<String>, error: ErrorValue) -> Self {
        self.error_map.insert(key.into(), error);
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn data(&self) -> &JsonValue {
        &self.data
    }

    pub fn error_map(&self) -> &IndexMap<String, ErrorValue> {
        &self.error_map
    }

    /// Returns the kind encoded in the code, if it is one of ours.
    pub fn kind(&self) -> Option<ErrorKind> {
        self.code.as_deref().and_then(ErrorKind::from_code)
    }

    pub fn is_kind(&self, kind: ErrorKind) -> bool {
        self.kind() == Some(kind)
    }

    /// Serializes the error into its JSON bag form.
    pub fn to_json(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or_else(|_| json!({ "message": self.message }))
    }

    pub(crate) fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::of_kind(ErrorKind::InvalidArguments, message)
    }

    pub(crate) fn not_a_handle() -> Self {
        Self::of_kind(ErrorKind::NotAHandle, "Not a handle.")
    }

    pub(crate) fn timed_out() -> Self {
        Self::of_kind(ErrorKind::Timeout, "Timed out.")
    }

    pub(crate) fn step_not_callable(key: &str) -> Self {
        Self::of_kind(
            ErrorKind::StepFailure,
            format!("Step '{}' is not a function.", key),
        )
    }

    pub(crate) fn deadline_elapsed(errors: IndexMap<String, ErrorValue>, data: JsonValue) -> Self {
        Self::of_kind(ErrorKind::Timeout, "Timeout during async operations.")
            .with_data(data)
            .with_error_map(errors)
    }

    pub(crate) fn aggregate(errors: IndexMap<String, ErrorValue>, data: JsonValue) -> Self {
        Self::of_kind(
            ErrorKind::AggregateFailure,
            "Error(s) occurred during async operations.",
        )
        .with_data(data)
        .with_error_map(errors)
    }
}

impl From<&str> for ErrorValue {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for ErrorValue {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

/// Converts a value that was classified as a failure into a rejection reason.
pub trait IntoFailure {
    fn into_failure(self) -> ErrorValue;
}

impl IntoFailure for ErrorValue {
    fn into_failure(self) -> ErrorValue {
        self
    }
}

impl IntoFailure for JsonValue {
    fn into_failure(self) -> ErrorValue {
        ErrorValue::from_bag(&self)
    }
}

impl IntoFailure for String {
    fn into_failure(self) -> ErrorValue {
        ErrorValue::new(self)
    }
}
