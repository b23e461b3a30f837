//! Operators, builtin functions and methods.
//!
//! Everything here is total: a bad operand produces a neutral value and a
//! `warn!` instead of an error.

use tracing::warn;

use crate::ast::BinaryOp;
use crate::value::Value;

/// Names callable as plain functions without a definition. `input` is
/// handled by the interpreter because it reads from the host.
pub const FUNCTIONS: &[&str] = &["rangeContinues", "isNumber", "isList", "isMap", "toNumber"];

fn arg(args: &[Value], n: usize) -> Value {
    args.get(n).cloned().unwrap_or_default()
}

fn number_or_zero(value: &Value, context: &str) -> f64 {
    match value.as_number() {
        Some(n) if !n.is_nan() => n,
        _ => {
            warn!(value = %value, kind = value.type_name(), context, "non-numeric operand treated as 0");
            0.0
        }
    }
}

/// `toNumber(v)`: numeric value of `v`, 0 when it has none.
pub fn to_number(value: &Value) -> f64 {
    match value.as_number() {
        Some(n) if !n.is_nan() => n,
        _ => 0.0,
    }
}

/// `rangeContinues(i, to, by)`: inclusive bound check in the direction of
/// the step. A zero step never continues.
pub fn range_continues(i: f64, to: f64, by: f64) -> bool {
    if by > 0.0 {
        i <= to
    } else if by < 0.0 {
        i >= to
    } else {
        false
    }
}

/// Calls a builtin from [`FUNCTIONS`].
pub fn call_function(name: &str, args: &[Value]) -> Option<Value> {
    let value = match name {
        "rangeContinues" => Value::Bool(range_continues(
            to_number(&arg(args, 0)),
            to_number(&arg(args, 1)),
            to_number(&arg(args, 2)),
        )),
        "isNumber" => Value::Bool(matches!(arg(args, 0), Value::Number(_))),
        "isList" => Value::Bool(matches!(arg(args, 0), Value::List(_))),
        "isMap" => Value::Bool(matches!(arg(args, 0), Value::Map(_))),
        "toNumber" => Value::Number(to_number(&arg(args, 0))),
        _ => return None,
    };
    Some(value)
}

/// `Math.<name>(args)`.
pub fn call_math(name: &str, args: &[Value]) -> Option<Value> {
    let nums: Vec<f64> = args.iter().map(|a| number_or_zero(a, name)).collect();
    let first = nums.first().copied().unwrap_or(0.0);
    let n = match name {
        "max" => nums.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        "min" => nums.iter().copied().fold(f64::INFINITY, f64::min),
        "floor" => first.floor(),
        "ceil" => first.ceil(),
        "round" => (first + 0.5).floor(),
        "abs" => first.abs(),
        "sqrt" if first < 0.0 => {
            warn!(operand = first, "sqrt of negative number treated as 0");
            0.0
        }
        "sqrt" => first.sqrt(),
        "pow" => first.powf(nums.get(1).copied().unwrap_or(0.0)),
        _ => return None,
    };
    Some(Value::Number(n))
}

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

pub fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Value {
    match op {
        BinaryOp::Add => match (lhs, rhs) {
            (Value::Text(_), _) | (_, Value::Text(_)) => Value::Text(format!("{lhs}{rhs}")),
            _ => Value::Number(number_or_zero(lhs, "+") + number_or_zero(rhs, "+")),
        },
        BinaryOp::Sub => Value::Number(number_or_zero(lhs, "-") - number_or_zero(rhs, "-")),
        BinaryOp::Mul => Value::Number(number_or_zero(lhs, "*") * number_or_zero(rhs, "*")),
        BinaryOp::Div | BinaryOp::Rem => {
            let a = number_or_zero(lhs, "/");
            let b = number_or_zero(rhs, "/");
            if b == 0.0 {
                warn!(dividend = a, "division by zero treated as 0");
                return Value::Number(0.0);
            }
            Value::Number(if op == BinaryOp::Div { a / b } else { a % b })
        }
        BinaryOp::Eq => Value::Bool(lhs.loose_eq(rhs)),
        BinaryOp::Ne => Value::Bool(!lhs.loose_eq(rhs)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => Value::Bool(compare(op, lhs, rhs)),
    }
}

fn compare(op: BinaryOp, lhs: &Value, rhs: &Value) -> bool {
    let ordering = match (lhs, rhs) {
        (Value::Text(a), Value::Text(b)) => a.partial_cmp(b),
        _ => match (lhs.as_number(), rhs.as_number()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
    };
    let Some(ordering) = ordering else {
        return false;
    };
    match op {
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::Le => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        BinaryOp::Ge => ordering.is_ge(),
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Indexing and members
// ---------------------------------------------------------------------------

/// `object[index]`.
pub fn index_get(object: &Value, index: &Value) -> Value {
    match object {
        Value::List(items) => {
            let items = items.borrow();
            match index.as_index().and_then(|i| items.get(i)) {
                Some(value) => value.clone(),
                None => {
                    warn!(index = %index, len = items.len(), "list index out of range read as null");
                    Value::Null
                }
            }
        }
        Value::Map(entries) => entries.borrow().get(&index.as_key()).cloned().unwrap_or_default(),
        Value::Text(s) => index
            .as_index()
            .and_then(|i| s.chars().nth(i))
            .map_or(Value::Null, |c| Value::Text(c.to_string())),
        other => {
            warn!(kind = other.type_name(), "indexing a non-collection read as null");
            Value::Null
        }
    }
}

/// Largest number of `null` slots a single list write may add.
pub const MAX_LIST_PADDING: usize = 4096;

/// `object[index] = value`. Writing one past the end of a list appends;
/// writing further pads with `null`, up to [`MAX_LIST_PADDING`] slots.
/// Writes beyond that leave the list unchanged.
pub fn index_set(object: &Value, index: &Value, value: Value) {
    match object {
        Value::List(items) => {
            let Some(i) = index.as_index() else {
                warn!(index = %index, "invalid list index ignored");
                return;
            };
            let mut items = items.borrow_mut();
            if i.saturating_sub(items.len()) > MAX_LIST_PADDING {
                warn!(index = i, len = items.len(), "list write far past the end ignored");
                return;
            }
            if i >= items.len() {
                items.resize(i + 1, Value::Null);
            }
            items[i] = value;
        }
        Value::Map(entries) => {
            entries.borrow_mut().insert(index.as_key(), value);
        }
        other => warn!(kind = other.type_name(), "index assignment on a non-collection ignored"),
    }
}

/// `object.name` outside a call.
pub fn member_get(object: &Value, name: &str) -> Value {
    if name == "length" {
        if let Some(len) = object.length() {
            return Value::Number(len as f64);
        }
    }
    match object {
        Value::Map(entries) => entries.borrow().get(name).cloned().unwrap_or_default(),
        other => {
            warn!(kind = other.type_name(), property = name, "unknown property read as null");
            Value::Null
        }
    }
}

/// `object.method(args)`. Unknown methods produce `null`.
pub fn call_method(object: &Value, name: &str, args: &[Value]) -> Value {
    match (object, name) {
        (Value::List(items), "push") => {
            let mut items = items.borrow_mut();
            items.extend(args.iter().cloned());
            Value::Number(items.len() as f64)
        }
        (Value::List(items), "pop") => items.borrow_mut().pop().unwrap_or_default(),
        (Value::List(items), "shift") => {
            let mut items = items.borrow_mut();
            if items.is_empty() {
                Value::Null
            } else {
                items.remove(0)
            }
        }
        (Value::List(items), "includes") => {
            let needle = arg(args, 0);
            Value::Bool(items.borrow().iter().any(|v| v.loose_eq(&needle)))
        }
        (Value::List(items), "indexOf") => {
            let needle = arg(args, 0);
            let found = items.borrow().iter().position(|v| v.loose_eq(&needle));
            Value::Number(found.map_or(-1.0, |i| i as f64))
        }
        (Value::Map(entries), "has") => Value::Bool(entries.borrow().contains_key(&arg(args, 0).as_key())),
        (Value::Map(entries), "keys") => Value::list(
            entries
                .borrow()
                .keys()
                .map(|k| Value::Text(k.clone()))
                .collect(),
        ),
        (Value::Text(s), "includes") => Value::Bool(s.contains(&arg(args, 0).to_string())),
        (other, _) => {
            warn!(kind = other.type_name(), method = name, "unknown method call returned null");
            Value::Null
        }
    }
}

/// Elements visited by `for (x of value)`: list items or map keys.
pub fn iterate(value: &Value) -> Vec<Value> {
    match value {
        Value::List(items) => items.borrow().clone(),
        Value::Map(entries) => entries.borrow().keys().map(|k| Value::Text(k.clone())).collect(),
        Value::Text(s) => s.chars().map(|c| Value::Text(c.to_string())).collect(),
        Value::Null => Vec::new(),
        other => {
            warn!(kind = other.type_name(), "iterating a non-collection skipped");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn n(x: f64) -> Value {
        Value::Number(x)
    }

    #[test]
    fn range_direction() {
        assert!(range_continues(2.0, 2.0, 1.0));
        assert!(!range_continues(3.0, 2.0, 1.0));
        assert!(range_continues(5.0, 1.0, -1.0));
        assert!(!range_continues(0.0, 10.0, 0.0));
    }

    #[test]
    fn arithmetic_recovers_bad_operands() {
        assert_eq!(binary(BinaryOp::Add, &n(1.0), &Value::list(vec![])), n(1.0));
        assert_eq!(binary(BinaryOp::Div, &n(4.0), &n(0.0)), n(0.0));
        assert_eq!(binary(BinaryOp::Add, &Value::text("a"), &n(1.0)), Value::text("a1"));
        assert_eq!(binary(BinaryOp::Rem, &n(7.0), &n(3.0)), n(1.0));
    }

    #[test]
    fn comparisons() {
        assert_eq!(binary(BinaryOp::Lt, &n(1.0), &n(2.0)), Value::Bool(true));
        assert_eq!(binary(BinaryOp::Ge, &Value::text("b"), &Value::text("a")), Value::Bool(true));
        assert_eq!(binary(BinaryOp::Lt, &Value::Null, &n(1.0)), Value::Bool(true));
        assert_eq!(binary(BinaryOp::Lt, &Value::text("x"), &n(1.0)), Value::Bool(false));
    }

    #[test]
    fn list_writes_extend() {
        let list = Value::list(vec![]);
        index_set(&list, &n(2.0), n(7.0));
        assert_eq!(list.to_json(), json!([null, null, 7]));
        assert_eq!(index_get(&list, &n(5.0)), Value::Null);
        index_set(&list, &n(-1.0), n(1.0));
        assert_eq!(list.length(), Some(3));
    }

    #[test]
    fn list_writes_far_past_the_end_are_ignored() {
        let list = Value::from_json(&json!([0]));
        index_set(&list, &n(1e15), n(1.0));
        assert_eq!(list.to_json(), json!([0]));

        let edge = (1 + MAX_LIST_PADDING) as f64;
        index_set(&list, &n(edge), n(1.0));
        assert_eq!(list.length(), Some(MAX_LIST_PADDING + 2));
        index_set(&list, &n(edge * 3.0), n(1.0));
        assert_eq!(list.length(), Some(MAX_LIST_PADDING + 2));
    }

    #[test]
    fn methods() {
        let list = Value::from_json(&json!([1, 2]));
        assert_eq!(call_method(&list, "push", &[n(3.0)]), n(3.0));
        assert_eq!(call_method(&list, "includes", &[n(2.0)]), Value::Bool(true));
        assert_eq!(call_method(&list, "pop", &[]), n(3.0));
        let map = Value::from_json(&json!({"A": ["B"]}));
        assert_eq!(call_method(&map, "has", &[Value::text("A")]), Value::Bool(true));
        assert_eq!(call_method(&map, "keys", &[]).to_json(), json!(["A"]));
        assert_eq!(member_get(&map, "length"), n(1.0));
        assert_eq!(call_method(&n(1.0), "push", &[]), Value::Null);
    }

    #[test]
    fn math() {
        assert_eq!(call_math("max", &[n(1.0), n(4.0), n(2.0)]), Some(n(4.0)));
        assert_eq!(call_math("pow", &[n(2.0), n(10.0)]), Some(n(1024.0)));
        assert_eq!(call_math("floor", &[n(2.7)]), Some(n(2.0)));
        assert_eq!(call_math("cbrt", &[]), None);
    }
}
