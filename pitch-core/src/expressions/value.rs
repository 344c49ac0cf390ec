//! Dynamic value semantics shared by the evaluator and the built-in filters.

use std::cmp::Ordering;

use serde_json::{Number, Value};

use super::ExpressionError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    pub(crate) fn from_value(value: &Value) -> Option<Num> {
        let n = value.as_number()?;
        if let Some(i) = n.as_i64() {
            return Some(Num::Int(i));
        }
        n.as_f64().map(Num::Float)
    }

    pub(crate) fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }

    pub(crate) fn into_value(self) -> Result<Value, ExpressionError> {
        match self {
            Num::Int(i) => Ok(Value::from(i)),
            Num::Float(f) => Number::from_f64(f)
                .map(Value::Number)
                .ok_or_else(|| ExpressionError::Type(format!("{f} is not a finite number"))),
        }
    }
}

pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "none",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Text form used when a value is interpolated into a larger string.
pub fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}

fn binary_type_error(op: &str, left: &Value, right: &Value) -> ExpressionError {
    ExpressionError::Type(format!(
        "unsupported operands for {op}: {} and {}",
        type_name(left),
        type_name(right)
    ))
}

fn numbers(op: &str, left: &Value, right: &Value) -> Result<(Num, Num), ExpressionError> {
    match (Num::from_value(left), Num::from_value(right)) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(binary_type_error(op, left, right)),
    }
}

pub(crate) fn add(left: &Value, right: &Value) -> Result<Value, ExpressionError> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
        (Value::Array(a), Value::Array(b)) => {
            Ok(Value::Array(a.iter().chain(b.iter()).cloned().collect()))
        }
        _ => match numbers("+", left, right)? {
            (Num::Int(a), Num::Int(b)) => match a.checked_add(b) {
                Some(v) => Num::Int(v).into_value(),
                None => Num::Float(a as f64 + b as f64).into_value(),
            },
            (a, b) => Num::Float(a.as_f64() + b.as_f64()).into_value(),
        },
    }
}

pub(crate) fn sub(left: &Value, right: &Value) -> Result<Value, ExpressionError> {
    match numbers("-", left, right)? {
        (Num::Int(a), Num::Int(b)) => match a.checked_sub(b) {
            Some(v) => Num::Int(v).into_value(),
            None => Num::Float(a as f64 - b as f64).into_value(),
        },
        (a, b) => Num::Float(a.as_f64() - b.as_f64()).into_value(),
    }
}

/// Upper bound on the length of a repeated string (bytes) or list (items).
pub const MAX_REPEAT_LEN: usize = 1_000_000;

pub(crate) fn mul(left: &Value, right: &Value) -> Result<Value, ExpressionError> {
    match (left, right) {
        (Value::String(s), Value::Number(_)) | (Value::Number(_), Value::String(s)) => {
            let times = repeat_count(left, right, s.len())?;
            Ok(Value::String(s.repeat(times)))
        }
        (Value::Array(a), Value::Number(_)) | (Value::Number(_), Value::Array(a)) => {
            let times = repeat_count(left, right, a.len())?;
            let mut out = Vec::with_capacity(a.len() * times);
            for _ in 0..times {
                out.extend(a.iter().cloned());
            }
            Ok(Value::Array(out))
        }
        _ => match numbers("*", left, right)? {
            (Num::Int(a), Num::Int(b)) => match a.checked_mul(b) {
                Some(v) => Num::Int(v).into_value(),
                None => Num::Float(a as f64 * b as f64).into_value(),
            },
            (a, b) => Num::Float(a.as_f64() * b.as_f64()).into_value(),
        },
    }
}

/// Negative counts repeat zero times; the repeated length must stay within [`MAX_REPEAT_LEN`].
fn repeat_count(left: &Value, right: &Value, len: usize) -> Result<usize, ExpressionError> {
    let Some(n) = left.as_i64().or_else(|| right.as_i64()) else {
        return Err(binary_type_error("*", left, right));
    };
    let times = usize::try_from(n).unwrap_or(0);
    match len.checked_mul(times) {
        Some(0) => Ok(0),
        Some(total) if total <= MAX_REPEAT_LEN => Ok(times),
        _ => Err(ExpressionError::Type(format!(
            "repetition by {n} exceeds {MAX_REPEAT_LEN} elements"
        ))),
    }
}

pub(crate) fn div(left: &Value, right: &Value) -> Result<Value, ExpressionError> {
    let (a, b) = numbers("/", left, right)?;
    if b.as_f64() == 0.0 {
        return Err(ExpressionError::DivisionByZero);
    }
    Num::Float(a.as_f64() / b.as_f64()).into_value()
}

pub(crate) fn floor_div(left: &Value, right: &Value) -> Result<Value, ExpressionError> {
    match numbers("//", left, right)? {
        (_, Num::Int(0)) => Err(ExpressionError::DivisionByZero),
        (Num::Int(a), Num::Int(b)) => {
            let q = a.wrapping_div(b);
            let floored = if a.wrapping_rem(b) != 0 && ((a < 0) != (b < 0)) {
                q - 1
            } else {
                q
            };
            Num::Int(floored).into_value()
        }
        (a, b) => {
            if b.as_f64() == 0.0 {
                return Err(ExpressionError::DivisionByZero);
            }
            Num::Float((a.as_f64() / b.as_f64()).floor()).into_value()
        }
    }
}

pub(crate) fn rem(left: &Value, right: &Value) -> Result<Value, ExpressionError> {
    match numbers("%", left, right)? {
        (_, Num::Int(0)) => Err(ExpressionError::DivisionByZero),
        (Num::Int(a), Num::Int(b)) => {
            let r = a.wrapping_rem(b);
            let r = if r != 0 && ((r < 0) != (b < 0)) { r + b } else { r };
            Num::Int(r).into_value()
        }
        (a, b) => {
            let (a, b) = (a.as_f64(), b.as_f64());
            if b == 0.0 {
                return Err(ExpressionError::DivisionByZero);
            }
            Num::Float(a - b * (a / b).floor()).into_value()
        }
    }
}

pub(crate) fn pow(left: &Value, right: &Value) -> Result<Value, ExpressionError> {
    match numbers("**", left, right)? {
        (Num::Int(a), Num::Int(b)) if (0..=u32::MAX as i64).contains(&b) => {
            match a.checked_pow(b as u32) {
                Some(v) => Num::Int(v).into_value(),
                None => Num::Float((a as f64).powf(b as f64)).into_value(),
            }
        }
        (a, b) => Num::Float(a.as_f64().powf(b.as_f64())).into_value(),
    }
}

pub(crate) fn negate(value: &Value) -> Result<Value, ExpressionError> {
    match Num::from_value(value) {
        Some(Num::Int(i)) => match i.checked_neg() {
            Some(v) => Num::Int(v).into_value(),
            None => Num::Float(-(i as f64)).into_value(),
        },
        Some(Num::Float(f)) => Num::Float(-f).into_value(),
        None => Err(ExpressionError::Type(format!(
            "bad operand for unary -: {}",
            type_name(value)
        ))),
    }
}

/// Equality where `1 == 1.0` holds, as in the source language of the templates.
pub fn loose_eq(left: &Value, right: &Value) -> bool {
    match (Num::from_value(left), Num::from_value(right)) {
        (Some(a), Some(b)) => a.as_f64() == b.as_f64(),
        _ => match (left, right) {
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| loose_eq(x, y))
            }
            _ => left == right,
        },
    }
}

pub(crate) fn compare(left: &Value, right: &Value) -> Result<Ordering, ExpressionError> {
    if let (Some(a), Some(b)) = (Num::from_value(left), Num::from_value(right)) {
        return a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .ok_or_else(|| binary_type_error("comparison", left, right));
    }
    match (left, right) {
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Ok(a.cmp(b)),
        (Value::Array(a), Value::Array(b)) => {
            for (x, y) in a.iter().zip(b) {
                match compare(x, y)? {
                    Ordering::Equal => continue,
                    other => return Ok(other),
                }
            }
            Ok(a.len().cmp(&b.len()))
        }
        _ => Err(binary_type_error("comparison", left, right)),
    }
}

pub(crate) fn contains(container: &Value, item: &Value) -> Result<bool, ExpressionError> {
    match container {
        Value::String(haystack) => match item {
            Value::String(needle) => Ok(haystack.contains(needle.as_str())),
            other => Err(ExpressionError::Type(format!(
                "'in <string>' requires string as left operand, not {}",
                type_name(other)
            ))),
        },
        Value::Array(items) => Ok(items.iter().any(|v| loose_eq(v, item))),
        Value::Object(map) => Ok(item.as_str().is_some_and(|k| map.contains_key(k))),
        other => Err(ExpressionError::Type(format!(
            "argument of type {} is not iterable",
            type_name(other)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn integer_arithmetic_stays_integral() {
        assert_eq!(add(&json!(2), &json!(3)).unwrap(), json!(5));
        assert_eq!(mul(&json!(4), &json!(-2)).unwrap(), json!(-8));
        assert_eq!(pow(&json!(2), &json!(10)).unwrap(), json!(1024));
    }

    #[test]
    fn division_always_produces_float() {
        assert_eq!(div(&json!(7), &json!(2)).unwrap(), json!(3.5));
        assert_eq!(div(&json!(1), &json!(0)), Err(ExpressionError::DivisionByZero));
    }

    #[test]
    fn floor_division_and_modulo_round_towards_negative_infinity() {
        assert_eq!(floor_div(&json!(-7), &json!(2)).unwrap(), json!(-4));
        assert_eq!(rem(&json!(-7), &json!(3)).unwrap(), json!(2));
        assert_eq!(rem(&json!(7), &json!(3)).unwrap(), json!(1));
    }

    #[test]
    fn string_and_list_operations() {
        assert_eq!(add(&json!("a"), &json!("b")).unwrap(), json!("ab"));
        assert_eq!(mul(&json!("ab"), &json!(2)).unwrap(), json!("abab"));
        assert_eq!(add(&json!([1]), &json!([2])).unwrap(), json!([1, 2]));
        assert!(add(&json!("a"), &json!(1)).is_err());
    }

    #[test]
    fn repetition_is_capped() {
        assert_eq!(mul(&json!(3), &json!([0])).unwrap(), json!([0, 0, 0]));
        assert_eq!(mul(&json!("ab"), &json!(-1)).unwrap(), json!(""));
        assert_eq!(mul(&json!([]), &json!(i64::MAX)).unwrap(), json!([]));
        assert!(matches!(
            mul(&json!("ab"), &json!(i64::MAX)),
            Err(ExpressionError::Type(_))
        ));
        assert!(matches!(
            mul(&json!([1, 2]), &json!(i64::MAX)),
            Err(ExpressionError::Type(_))
        ));
        assert!(mul(&json!("x"), &json!(MAX_REPEAT_LEN + 1)).is_err());
    }

    #[test]
    fn loose_equality_mixes_ints_and_floats() {
        assert!(loose_eq(&json!(1), &json!(1.0)));
        assert!(!loose_eq(&json!("1"), &json!(1)));
    }

    #[test]
    fn membership() {
        assert!(contains(&json!("hello"), &json!("ell")).unwrap());
        assert!(contains(&json!([1, 2]), &json!(2.0)).unwrap());
        assert!(contains(&json!({"k": 1}), &json!("k")).unwrap());
        assert!(contains(&json!(3), &json!(1)).is_err());
    }

    #[test]
    fn text_rendering() {
        assert_eq!(to_text(&Value::Null), "");
        assert_eq!(to_text(&json!(true)), "true");
        assert_eq!(to_text(&json!({"a": 1})), r#"{"a":1}"#);
    }
}
