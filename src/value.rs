//! Tagged value model.
//!
//! A [`Value`] is either a scalar, raw (not yet wrapped) structured data, or a
//! reference to a wrapped scope. Raw maps and lists are upgraded to
//! [`Value::Scope`] the first time they are read through a scope, and stay
//! wrapped from then on.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::scope::ScopeId;

/// A model value.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    /// Raw sequence data, not yet observed.
    List(Vec<Value>),
    /// Raw keyed data, not yet observed.
    Map(BTreeMap<String, Value>),
    /// A wrapped sequence or mapping. Compared by identity.
    Scope(ScopeId),
}

impl Value {
    /// Build a raw map from key/value pairs.
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Whether the value is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether the value is a scalar (not structured, not a scope).
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Value::List(_) | Value::Map(_) | Value::Scope(_))
    }

    /// The wrapped scope, if any.
    pub fn as_scope(&self) -> Option<ScopeId> {
        match self {
            Value::Scope(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Browser-style truthiness: null, false, 0, NaN and "" are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::List(_) | Value::Map(_) | Value::Scope(_) => true,
        }
    }

    /// Total order used by the default sequence sort.
    ///
    /// Numbers compare numerically, strings lexicographically, booleans with
    /// `false < true`; values of different kinds order by kind, with `Null`
    /// last.
    pub fn loose_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.total_cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Bool(_) => 0,
            Value::Number(_) => 1,
            Value::String(_) => 2,
            Value::List(_) => 3,
            Value::Map(_) => 4,
            Value::Scope(_) => 5,
            Value::Null => 6,
        }
    }

    /// Convert a JSON document into raw model data.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

/// Display text of a scalar, following browser string conversion.
///
/// Structured values render as placeholders; use
/// [`Engine::display`](crate::engine::Engine::display) to resolve scopes.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::String(s) => f.write_str(s),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Value::Map(_) | Value::Scope(_) => f.write_str("[object Object]"),
        }
    }
}

pub(crate) fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<ScopeId> for Value {
    fn from(id: ScopeId) -> Self {
        Value::Scope(id)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from_json(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_json_nested() {
        let value = Value::from(json!({"items": [1, "two"], "ok": true, "none": null}));
        let Value::Map(entries) = value else {
            panic!("expected a map");
        };
        assert_eq!(
            entries["items"],
            Value::List(vec![Value::Number(1.0), Value::from("two")])
        );
        assert_eq!(entries["ok"], Value::Bool(true));
        assert!(entries["none"].is_null());
    }

    #[test]
    fn display_follows_browser_conversion() {
        assert_eq!(Value::from(3).to_string(), "3");
        assert_eq!(Value::from(2.5).to_string(), "2.5");
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::from(true).to_string(), "true");
        assert_eq!(Value::List(vec![1.into(), "a".into()]).to_string(), "1,a");
        assert_eq!(Value::map([("a", Value::Null)]).to_string(), "[object Object]");
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::from(0).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(!Value::Number(f64::NAN).is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(Value::List(Vec::new()).is_truthy());
    }

    #[test]
    fn loose_cmp_orders_within_and_across_kinds() {
        assert_eq!(Value::from(2).loose_cmp(&Value::from(10)), Ordering::Less);
        assert_eq!(Value::from("b").loose_cmp(&Value::from("a")), Ordering::Greater);
        assert_eq!(Value::from(1).loose_cmp(&Value::from("1")), Ordering::Less);
        assert_eq!(Value::Null.loose_cmp(&Value::from("z")), Ordering::Greater);
    }

    #[test]
    fn scalar_classification() {
        assert!(Value::from(1).is_scalar());
        assert!(Value::Null.is_scalar());
        assert!(!Value::List(Vec::new()).is_scalar());
        assert!(Value::from("x").as_scope().is_none());
    }
}
