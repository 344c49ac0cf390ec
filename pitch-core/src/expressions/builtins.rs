use serde_json::Value;

use super::environment::Environment;
use super::value::{is_truthy, to_text, type_name, Num};
use super::ExpressionError;

pub(crate) fn register_filters(env: &mut Environment) {
    env.register_filter("from_environment", |value, args| {
        let key = to_text(value);
        match std::env::var(&key) {
            Ok(v) => Ok(Value::String(v)),
            Err(_) => Ok(args.first().cloned().unwrap_or(Value::Null)),
        }
    });
    env.register_filter("to_json", |value, args| {
        let pretty = args.first().is_some_and(is_truthy);
        let text = if pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        text.map(Value::String)
            .map_err(|e| ExpressionError::filter("to_json", e.to_string()))
    });
    env.register_filter("from_json", |value, _| match value {
        Value::String(s) => serde_json::from_str(s)
            .map_err(|e| ExpressionError::filter("from_json", e.to_string())),
        other => Err(ExpressionError::filter(
            "from_json",
            format!("expected a string, got {}", type_name(other)),
        )),
    });
    env.register_filter("length", length);
    env.register_filter("count", length);
    env.register_filter("upper", |value, _| Ok(Value::String(to_text(value).to_uppercase())));
    env.register_filter("lower", |value, _| Ok(Value::String(to_text(value).to_lowercase())));
    env.register_filter("trim", |value, _| Ok(Value::String(to_text(value).trim().to_string())));
    env.register_filter("string", |value, _| Ok(Value::String(to_text(value))));
    env.register_filter("int", |value, args| {
        let fallback = args.first().cloned().unwrap_or(Value::from(0));
        Ok(to_int(value).map(Value::from).unwrap_or(fallback))
    });
    env.register_filter("float", |value, args| {
        let fallback = args.first().cloned().unwrap_or(Value::from(0.0));
        Ok(to_float(value)
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(fallback))
    });
    env.register_filter("join", |value, args| {
        let separator = args.first().map(to_text).unwrap_or_default();
        match value {
            Value::Array(items) => Ok(Value::String(
                items.iter().map(to_text).collect::<Vec<_>>().join(&separator),
            )),
            other => Ok(Value::String(to_text(other))),
        }
    });
    env.register_filter("first", |value, _| Ok(edge(value, true)));
    env.register_filter("last", |value, _| Ok(edge(value, false)));
    env.register_filter("abs", |value, _| match Num::from_value(value) {
        Some(Num::Int(i)) => Ok(Value::from(i.saturating_abs())),
        Some(Num::Float(f)) => Num::Float(f.abs()).into_value(),
        None => Err(ExpressionError::filter("abs", format!("expected a number, got {}", type_name(value)))),
    });
    env.register_filter("round", |value, args| {
        let n = Num::from_value(value).ok_or_else(|| {
            ExpressionError::filter("round", format!("expected a number, got {}", type_name(value)))
        })?;
        let precision = args.first().and_then(Value::as_i64).unwrap_or(0).clamp(0, 15) as i32;
        let factor = 10f64.powi(precision);
        Num::Float((n.as_f64() * factor).round() / factor).into_value()
    });
    env.register_filter("replace", |value, args| {
        let (Some(from), Some(to)) = (args.first(), args.get(1)) else {
            return Err(ExpressionError::filter("replace", "expected two arguments"));
        };
        Ok(Value::String(to_text(value).replace(&to_text(from), &to_text(to))))
    });
    env.register_filter("list", |value, _| match value {
        Value::Array(_) => Ok(value.clone()),
        Value::String(s) => Ok(Value::Array(s.chars().map(|c| Value::String(c.to_string())).collect())),
        Value::Object(map) => Ok(Value::Array(map.keys().cloned().map(Value::String).collect())),
        other => Err(ExpressionError::filter("list", format!("{} is not iterable", type_name(other)))),
    });
    env.register_filter("keys", |value, _| match value {
        Value::Object(map) => Ok(Value::Array(map.keys().cloned().map(Value::String).collect())),
        other => Err(ExpressionError::filter("keys", format!("expected a mapping, got {}", type_name(other)))),
    });
}

pub(crate) fn register_tests(env: &mut Environment) {
    // Every value that reached a test is already a JSON value.
    env.register_test("json_serializable", |_, _| Ok(true));
    env.register_test("none", |value, _| Ok(value.is_null()));
    env.register_test("number", |value, _| Ok(value.is_number()));
    env.register_test("string", |value, _| Ok(value.is_string()));
    env.register_test("mapping", |value, _| Ok(value.is_object()));
    env.register_test("sequence", |value, _| Ok(value.is_array() || value.is_string()));
    env.register_test("boolean", |value, _| Ok(value.is_boolean()));
    env.register_test("even", |value, _| Ok(value.as_i64().is_some_and(|i| i % 2 == 0)));
    env.register_test("odd", |value, _| Ok(value.as_i64().is_some_and(|i| i % 2 != 0)));
}

fn length(value: &Value, _: &[Value]) -> Result<Value, ExpressionError> {
    match value {
        Value::String(s) => Ok(Value::from(s.chars().count())),
        Value::Array(a) => Ok(Value::from(a.len())),
        Value::Object(o) => Ok(Value::from(o.len())),
        other => Err(ExpressionError::filter(
            "length",
            format!("object of type {} has no length", type_name(other)),
        )),
    }
}

fn to_int(value: &Value) -> Option<i64> {
    match value {
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Number(_) => match Num::from_value(value)? {
            Num::Int(i) => Some(i),
            Num::Float(f) => Some(f.trunc() as i64),
        },
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| s.parse::<f64>().ok().map(|f| f.trunc() as i64))
        }
        _ => None,
    }
}

fn to_float(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn edge(value: &Value, first: bool) -> Value {
    match value {
        Value::Array(items) => {
            let item = if first { items.first() } else { items.last() };
            item.cloned().unwrap_or(Value::Null)
        }
        Value::String(s) => {
            let c = if first { s.chars().next() } else { s.chars().last() };
            c.map(|c| Value::String(c.to_string())).unwrap_or(Value::Null)
        }
        _ => Value::Null,
    }
}
