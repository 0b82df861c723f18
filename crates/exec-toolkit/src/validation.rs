//! Validation of loosely typed option bags.
//!
//! A schema is a list of named rules, each pairing a raw value with the kind
//! it is expected to have and some options (a default used when the value is
//! absent, and whether an invalid value should be logged). [`validate`]
//! normalizes the bag and collects every violation.

use serde_json::{Map, Value as JsonValue};
use std::fmt;
use tracing::warn;

/// The expected kind of a validated value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Any,
    Object,
    Array,
    /// An object or an array.
    Collection,
    Number,
    PositiveInteger,
    String,
    Bool,
}

impl Kind {
    pub fn matches(self, value: &JsonValue) -> bool {
        match self {
            Kind::Any => true,
            Kind::Object => value.is_object(),
            Kind::Array => value.is_array(),
            Kind::Collection => value.is_object() || value.is_array(),
            Kind::Number => value.is_number(),
            Kind::PositiveInteger => value.as_u64().is_some_and(|n| n > 0),
            Kind::String => value.is_string(),
            Kind::Bool => value.is_boolean(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Kind::Any => "any value",
            Kind::Object => "an object",
            Kind::Array => "an array",
            Kind::Collection => "an object or an array",
            Kind::Number => "a number",
            Kind::PositiveInteger => "a positive integer",
            Kind::String => "a string",
            Kind::Bool => "a boolean",
        }
    }
}

/// Options attached to a rule.
#[derive(Debug, Clone, Default)]
pub struct RuleOptions {
    /// Used when the raw value is absent (`None` or JSON `null`). It must
    /// satisfy the rule's kind like any other value.
    pub default: Option<JsonValue>,
    /// Log a warning when a present raw value is invalid.
    pub warn: bool,
}

/// One schema entry: a raw value, its expected kind and options.
#[derive(Debug, Clone)]
pub struct Rule {
    value: Option<JsonValue>,
    kind: Kind,
    options: RuleOptions,
}

impl Rule {
    pub fn new(value: Option<JsonValue>, kind: Kind) -> Self {
        Self {
            value,
            kind,
            options: RuleOptions::default(),
        }
    }

    pub fn with_default(mut self, default: JsonValue) -> Self {
        self.options.default = Some(default);
        self
    }

    pub fn with_warn(mut self, warn: bool) -> Self {
        self.options.warn = warn;
        self
    }
}

/// A rule that was not satisfied.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub field: String,
    pub expected: Kind,
    /// The offending value; `None` when a required value was missing.
    pub actual: Option<JsonValue>,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.actual {
            Some(actual) => write!(
                f,
                "'{}' must be {}, got {}",
                self.field,
                self.expected.name(),
                actual
            ),
            None => write!(f, "'{}' is required", self.field),
        }
    }
}

/// Outcome of [`validate`].
#[derive(Debug, Clone, Default)]
pub struct Validated {
    value: Map<String, JsonValue>,
    violations: Vec<Violation>,
}

impl Validated {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// The normalized bag. Only fields that passed validation are present.
    pub fn value(&self) -> &Map<String, JsonValue> {
        &self.value
    }

    pub fn get(&self, field: &str) -> Option<&JsonValue> {
        self.value.get(field)
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }
}

/// Validates every rule of `schema`.
///
/// # Examples
///
/// ```
/// use exec_toolkit::validation::{Kind, Rule, validate};
/// use serde_json::json;
///
/// let check = validate([
///     ("timeout", Rule::new(None, Kind::PositiveInteger).with_default(json!(60000))),
///     ("name", Rule::new(Some(json!(3)), Kind::String)),
/// ]);
///
/// assert!(!check.is_valid());
/// assert_eq!(check.get("timeout"), Some(&json!(60000)));
/// assert_eq!(check.violations()[0].field, "name");
/// ```
pub fn validate<'a>(schema: impl IntoIterator<Item = (&'a str, Rule)>) -> Validated {
    let mut validated = Validated::default();

    for (field, rule) in schema {
        let raw = rule.value.filter(|v| !v.is_null());
        match raw {
            None => match rule.options.default {
                Some(default) if rule.kind.matches(&default) => {
                    validated.value.insert(field.to_string(), default);
                }
                Some(default) => {
                    warn!(field = %field, value = %default, expected = rule.kind.name(), "Invalid default value");
                    validated.violations.push(Violation {
                        field: field.to_string(),
                        expected: rule.kind,
                        actual: Some(default),
                    });
                }
                None => validated.violations.push(Violation {
                    field: field.to_string(),
                    expected: rule.kind,
                    actual: None,
                }),
            },
            Some(value) if rule.kind.matches(&value) => {
                validated.value.insert(field.to_string(), value);
            }
            Some(value) => {
                if rule.options.warn {
                    warn!(field = %field, value = %value, expected = rule.kind.name(), "Invalid value");
                }
                validated.violations.push(Violation {
                    field: field.to_string(),
                    expected: rule.kind,
                    actual: Some(value),
                });
            }
        }
    }

    validated
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_matches() {
        assert!(Kind::Collection.matches(&json!({})));
        assert!(Kind::Collection.matches(&json!([])));
        assert!(!Kind::Collection.matches(&json!("x")));
        assert!(Kind::PositiveInteger.matches(&json!(1)));
        assert!(!Kind::PositiveInteger.matches(&json!(0)));
        assert!(!Kind::PositiveInteger.matches(&json!(-5)));
        assert!(!Kind::PositiveInteger.matches(&json!(1.5)));
        assert!(Kind::Any.matches(&JsonValue::Null));
    }

    #[test]
    fn test_default_fills_missing_value() {
        let check = validate([(
            "timeout",
            Rule::new(None, Kind::PositiveInteger).with_default(json!(60000)),
        )]);

        assert!(check.is_valid());
        assert_eq!(check.get("timeout"), Some(&json!(60000)));
    }

    #[test]
    fn test_null_counts_as_missing() {
        let check = validate([(
            "timeout",
            Rule::new(Some(JsonValue::Null), Kind::Number).with_default(json!(5)),
        )]);

        assert_eq!(check.get("timeout"), Some(&json!(5)));
    }

    #[test]
    fn test_missing_required_value_is_violation() {
        let check = validate([("tasks", Rule::new(None, Kind::Object))]);

        assert!(!check.is_valid());
        assert_eq!(check.violations()[0].to_string(), "'tasks' is required");
    }

    #[test]
    fn test_invalid_value_is_not_replaced_by_default() {
        let check = validate([(
            "timeout",
            Rule::new(Some(json!("soon")), Kind::Number)
                .with_default(json!(60000))
                .with_warn(true),
        )]);

        assert!(!check.is_valid());
        assert!(check.get("timeout").is_none());
        assert_eq!(
            check.violations()[0].to_string(),
            "'timeout' must be a number, got \"soon\""
        );
    }

    #[test]
    fn test_default_must_match_kind() {
        let check = validate([(
            "timeout",
            Rule::new(None, Kind::PositiveInteger).with_default(json!(0)),
        )]);

        assert!(!check.is_valid());
        assert!(check.get("timeout").is_none());
        assert_eq!(
            check.violations()[0].to_string(),
            "'timeout' must be a positive integer, got 0"
        );
    }

    #[test]
    fn test_all_violations_are_collected() {
        let check = validate([
            ("a", Rule::new(Some(json!(1)), Kind::String)),
            ("b", Rule::new(Some(json!(true)), Kind::Bool)),
            ("c", Rule::new(Some(json!([])), Kind::Object)),
        ]);

        let fields: Vec<_> = check.violations().iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["a", "c"]);
        assert_eq!(check.get("b"), Some(&json!(true)));
    }
}
