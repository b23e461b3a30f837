//! Runtime values for the script interpreter.
//!
//! Scalars are copied; lists and maps are shared and mutated by reference,
//! the way the emitted script expects (`list.push(x)` inside a procedure is
//! visible to the caller).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

/// Nesting depth past which [`Value::to_json`] gives up (self-referencing
/// lists would otherwise recurse forever).
const MAX_JSON_DEPTH: usize = 64;

/// A runtime value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Rc<RefCell<Vec<Value>>>),
    Map(Rc<RefCell<IndexMap<String, Value>>>),
}

impl Value {
    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn map(entries: IndexMap<String, Value>) -> Value {
        Value::Map(Rc::new(RefCell::new(entries)))
    }

    pub fn text(s: impl Into<String>) -> Value {
        Value::Text(s.into())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Text(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Script truthiness: `null`, `false`, `0`, `NaN` and `""` are false.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Text(s) => !s.is_empty(),
            Value::List(_) | Value::Map(_) => true,
        }
    }

    /// Numeric view of a scalar, `None` for text that is not a number and
    /// for lists and maps.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Null => Some(0.0),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Number(n) => Some(*n),
            Value::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    Some(0.0)
                } else {
                    trimmed.parse::<f64>().ok()
                }
            }
            Value::List(_) | Value::Map(_) => None,
        }
    }

    /// Integer index view: finite, non-negative and whole.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Value::Number(n) if n.is_finite() && *n >= 0.0 && n.fract() == 0.0 => Some(*n as usize),
            _ => None,
        }
    }

    /// Key under which this value indexes a map.
    pub fn as_key(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Script `==`: same-kind scalars compare by value, numbers coerce
    /// booleans and numeric text, lists and maps compare by identity.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
            (Value::List(_) | Value::Map(_), _) | (_, Value::List(_) | Value::Map(_)) => false,
            (a, b) => match (a.as_number(), b.as_number()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }

    /// Number of elements of a list, entries of a map or characters of text.
    pub fn length(&self) -> Option<usize> {
        match self {
            Value::List(items) => Some(items.borrow().len()),
            Value::Map(entries) => Some(entries.borrow().len()),
            Value::Text(s) => Some(s.chars().count()),
            _ => None,
        }
    }

    // -----------------------------------------------------------------------
    // JSON conversion
    // -----------------------------------------------------------------------

    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => Value::Text(s.clone()),
            serde_json::Value::Array(items) => Value::list(items.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(entries) => Value::map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// JSON form of the value. Whole numbers become JSON integers and
    /// non-finite numbers become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        self.to_json_at(0)
    }

    fn to_json_at(&self, depth: usize) -> serde_json::Value {
        if depth > MAX_JSON_DEPTH {
            return serde_json::Value::Null;
        }
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => number_json(*n),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => serde_json::Value::Array(
                items.borrow().iter().map(|v| v.to_json_at(depth + 1)).collect(),
            ),
            Value::Map(entries) => serde_json::Value::Object(
                entries
                    .borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json_at(depth + 1)))
                    .collect(),
            ),
        }
    }
}

fn number_json(n: f64) -> serde_json::Value {
    if !n.is_finite() {
        return serde_json::Value::Null;
    }
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        return serde_json::Value::from(n as i64);
    }
    serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

/// Normalizes a JSON value the way a round trip through the runtime would,
/// so `9` and `9.0` compare equal.
pub fn normalize_json(json: &serde_json::Value) -> serde_json::Value {
    Value::from_json(json).to_json()
}

fn format_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.is_nan() {
        write!(f, "NaN")
    } else if n.is_infinite() {
        write!(f, "{}", if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        write!(f, "{}", n as i128)
    } else {
        write!(f, "{n}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => format_number(*n, f),
            Value::Text(s) => write!(f, "{s}"),
            Value::List(items) => {
                let items = items.borrow();
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    match item {
                        Value::List(_) | Value::Map(_) => write!(f, "{}", item.type_name())?,
                        other => write!(f, "{other}")?,
                    }
                }
                Ok(())
            }
            Value::Map(_) => write!(f, "[object Object]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truthiness() {
        assert!(!Value::Null.truthy());
        assert!(!Value::Number(0.0).truthy());
        assert!(!Value::Number(f64::NAN).truthy());
        assert!(!Value::text("").truthy());
        assert!(Value::list(vec![]).truthy());
        assert!(Value::text("0").truthy());
    }

    #[test]
    fn loose_equality() {
        assert!(Value::Number(1.0).loose_eq(&Value::text("1")));
        assert!(Value::Bool(true).loose_eq(&Value::Number(1.0)));
        assert!(!Value::Null.loose_eq(&Value::Number(0.0)));
        let list = Value::list(vec![Value::Number(1.0)]);
        assert!(list.loose_eq(&list.clone()));
        assert!(!list.loose_eq(&Value::list(vec![Value::Number(1.0)])));
    }

    #[test]
    fn lists_are_shared_by_clone() {
        let a = Value::list(vec![]);
        let b = a.clone();
        if let Value::List(items) = &b {
            items.borrow_mut().push(Value::Number(2.0));
        }
        assert_eq!(a.length(), Some(1));
    }

    #[test]
    fn json_numbers_are_normalized() {
        assert_eq!(Value::Number(9.0).to_json(), json!(9));
        assert_eq!(Value::Number(0.5).to_json(), json!(0.5));
        assert_eq!(Value::Number(f64::INFINITY).to_json(), json!(null));
        assert_eq!(normalize_json(&json!([9.0, {"a": 2.0}])), json!([9, {"a": 2}]));
    }

    #[test]
    fn display_matches_script_text() {
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
        assert_eq!(Value::from_json(&json!([1, "a", null])).to_string(), "1,a,null");
    }

    #[test]
    fn self_referencing_list_serializes() {
        let list = Value::list(vec![]);
        if let Value::List(items) = &list {
            items.borrow_mut().push(list.clone());
        }
        let json = list.to_json();
        assert!(json.is_array());
    }
}
