//! Visibility rule evaluation.
//!
//! Rules reference another setting's current value and decide whether a
//! setting or section is shown. Evaluation is pure and total.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One or more rules attached to a setting or section.
///
/// An array is an implicit AND across its entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VisibilityRules {
    All(Vec<VisibilityRule>),
    Single(VisibilityRule),
}

/// A single rule: either an OR-group or a plain condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VisibilityRule {
    Any { or: Vec<VisibilityCondition> },
    Condition(VisibilityCondition),
}

/// A predicate over the value of the setting named by `setting_key`.
///
/// The first present operator (in field order) decides; with none present
/// the condition tests truthiness.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityCondition {
    pub setting_key: String,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub equals: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub not_equals: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub greater_than: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub less_than: Option<f64>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub contains: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_empty: Option<bool>,
}

/// Keeps an explicit `null` as `Some(Value::Null)` instead of collapsing it to `None`.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

enum Operator<'a> {
    Equals(&'a Value),
    NotEquals(&'a Value),
    OneOf(&'a [Value]),
    GreaterThan(f64),
    LessThan(f64),
    Contains(&'a Value),
    IsEmpty(bool),
    Truthy,
}

impl VisibilityCondition {
    /// Condition on `setting_key` with no operator (truthiness).
    pub fn truthy(setting_key: impl Into<String>) -> Self {
        Self {
            setting_key: setting_key.into(),
            ..Self::default()
        }
    }

    /// Condition requiring `setting_key` to equal `value`.
    pub fn equals(setting_key: impl Into<String>, value: Value) -> Self {
        Self {
            setting_key: setting_key.into(),
            equals: Some(value),
            ..Self::default()
        }
    }

    fn operator(&self) -> Operator<'_> {
        if let Some(expected) = &self.equals {
            Operator::Equals(expected)
        } else if let Some(expected) = &self.not_equals {
            Operator::NotEquals(expected)
        } else if let Some(options) = &self.one_of {
            Operator::OneOf(options)
        } else if let Some(bound) = self.greater_than {
            Operator::GreaterThan(bound)
        } else if let Some(bound) = self.less_than {
            Operator::LessThan(bound)
        } else if let Some(item) = &self.contains {
            Operator::Contains(item)
        } else if let Some(expected) = self.is_empty {
            Operator::IsEmpty(expected)
        } else {
            Operator::Truthy
        }
    }

    /// Evaluate against the current values. A missing key reads as undefined.
    pub fn evaluate(&self, values: &Map<String, Value>) -> bool {
        let value = values.get(&self.setting_key);
        match self.operator() {
            Operator::Equals(expected) => value.is_some_and(|v| same_value(v, expected)),
            Operator::NotEquals(expected) => !value.is_some_and(|v| same_value(v, expected)),
            Operator::OneOf(options) => {
                value.is_some_and(|v| options.iter().any(|option| same_value(v, option)))
            }
            Operator::GreaterThan(bound) => value
                .and_then(Value::as_f64)
                .is_some_and(|number| number > bound),
            Operator::LessThan(bound) => value
                .and_then(Value::as_f64)
                .is_some_and(|number| number < bound),
            Operator::Contains(item) => value
                .and_then(Value::as_array)
                .is_some_and(|items| items.iter().any(|v| same_value(v, item))),
            Operator::IsEmpty(expected) => is_empty(value) == expected,
            Operator::Truthy => is_truthy(value),
        }
    }
}

impl VisibilityRule {
    pub fn evaluate(&self, values: &Map<String, Value>) -> bool {
        match self {
            VisibilityRule::Any { or } => or.iter().any(|condition| condition.evaluate(values)),
            VisibilityRule::Condition(condition) => condition.evaluate(values),
        }
    }
}

impl VisibilityRules {
    pub fn as_slice(&self) -> &[VisibilityRule] {
        match self {
            VisibilityRules::All(rules) => rules,
            VisibilityRules::Single(rule) => std::slice::from_ref(rule),
        }
    }
}

/// Decide whether something guarded by `rules` is visible.
///
/// No rules, or an empty rule list, means always visible.
pub fn evaluate(rules: Option<&VisibilityRules>, values: &Map<String, Value>) -> bool {
    rules.is_none_or(|rules| rules.as_slice().iter().all(|rule| rule.evaluate(values)))
}

/// Strict equality, except that numbers compare by numeric value.
fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}
