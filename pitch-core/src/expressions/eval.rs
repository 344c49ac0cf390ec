use serde_json::{Map, Value};

use super::ast::{BinaryOp, CompareOp, Expr};
use super::environment::Environment;
use super::value::{self, is_truthy, loose_eq, to_text};
use super::{ExpressionError, Namespace};

pub(crate) struct Evaluator<'a> {
    pub env: &'a Environment,
    pub namespace: &'a Namespace,
}

impl Evaluator<'_> {
    pub(crate) fn eval(&self, expr: &Expr) -> Result<Value, ExpressionError> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Variable(name) => self
                .namespace
                .get(name)
                .cloned()
                .ok_or_else(|| ExpressionError::Unresolved(name.clone())),
            Expr::Attribute(base, attr) => {
                let base_value = self.eval(base)?;
                lookup_attribute(&base_value, attr)
                    .ok_or_else(|| ExpressionError::Unresolved(expr.describe()))
            }
            Expr::Index(base, index) => {
                let base_value = self.eval(base)?;
                let index_value = self.eval(index)?;
                lookup_index(&base_value, &index_value)
                    .ok_or_else(|| ExpressionError::Unresolved(expr.describe()))
            }
            Expr::List(items) => items
                .iter()
                .map(|item| self.eval(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Expr::Mapping(entries) => {
                let mut map = Map::new();
                for (k, v) in entries {
                    let key = to_text(&self.eval(k)?);
                    map.insert(key, self.eval(v)?);
                }
                Ok(Value::Object(map))
            }
            Expr::Negate(inner) => value::negate(&self.eval(inner)?),
            Expr::Not(inner) => Ok(Value::Bool(!is_truthy(&self.eval(inner)?))),
            Expr::And(left, right) => {
                let l = self.eval(left)?;
                if !is_truthy(&l) {
                    return Ok(l);
                }
                self.eval(right)
            }
            Expr::Or(left, right) => {
                let l = self.eval(left)?;
                if is_truthy(&l) {
                    return Ok(l);
                }
                self.eval(right)
            }
            Expr::Binary(op, left, right) => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                match op {
                    BinaryOp::Add => value::add(&l, &r),
                    BinaryOp::Sub => value::sub(&l, &r),
                    BinaryOp::Mul => value::mul(&l, &r),
                    BinaryOp::Div => value::div(&l, &r),
                    BinaryOp::FloorDiv => value::floor_div(&l, &r),
                    BinaryOp::Rem => value::rem(&l, &r),
                    BinaryOp::Pow => value::pow(&l, &r),
                    BinaryOp::Concat => Ok(Value::String(format!("{}{}", to_text(&l), to_text(&r)))),
                }
            }
            Expr::Compare(first, rest) => {
                let mut left = self.eval(first)?;
                for (op, right_expr) in rest {
                    let right = self.eval(right_expr)?;
                    if !compare(*op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            Expr::Conditional {
                then,
                condition,
                otherwise,
            } => {
                if is_truthy(&self.eval(condition)?) {
                    self.eval(then)
                } else {
                    match otherwise {
                        Some(e) => self.eval(e),
                        None => Ok(Value::Null),
                    }
                }
            }
            Expr::Filter { input, name, args } => self.eval_filter(input, name, args),
            Expr::Test {
                input,
                name,
                args,
                negated,
            } => {
                let outcome = self.eval_test(input, name, args)?;
                Ok(Value::Bool(outcome != *negated))
            }
        }
    }

    fn eval_args(&self, args: &[Expr]) -> Result<Vec<Value>, ExpressionError> {
        args.iter().map(|a| self.eval(a)).collect()
    }

    fn eval_filter(&self, input: &Expr, name: &str, args: &[Expr]) -> Result<Value, ExpressionError> {
        // `default` has to see undefined inputs, so it is resolved before the input is forced.
        if name == "default" || name == "d" {
            let args = self.eval_args(args)?;
            let fallback = args.first().cloned().unwrap_or(Value::String(String::new()));
            let replace_falsy = args.get(1).is_some_and(is_truthy);
            return match self.eval(input) {
                Ok(v) if replace_falsy && !is_truthy(&v) => Ok(fallback),
                Ok(v) => Ok(v),
                Err(e) if e.is_unresolved() => Ok(fallback),
                Err(e) => Err(e),
            };
        }
        let filter = self
            .env
            .filter(name)
            .ok_or_else(|| ExpressionError::UnknownFilter(name.to_string()))?;
        let value = self.eval(input)?;
        let args = self.eval_args(args)?;
        filter(&value, args.as_slice())
    }

    fn eval_test(&self, input: &Expr, name: &str, args: &[Expr]) -> Result<bool, ExpressionError> {
        match name {
            "defined" | "undefined" => {
                let defined = match self.eval(input) {
                    Ok(_) => true,
                    Err(e) if e.is_unresolved() => false,
                    Err(e) => return Err(e),
                };
                Ok(defined == (name == "defined"))
            }
            _ => {
                let test = self
                    .env
                    .test(name)
                    .ok_or_else(|| ExpressionError::UnknownTest(name.to_string()))?;
                let value = self.eval(input)?;
                let args = self.eval_args(args)?;
                test(&value, args.as_slice())
            }
        }
    }
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool, ExpressionError> {
    use std::cmp::Ordering::*;
    Ok(match op {
        CompareOp::Eq => loose_eq(left, right),
        CompareOp::Ne => !loose_eq(left, right),
        CompareOp::Lt => value::compare(left, right)? == Less,
        CompareOp::Le => value::compare(left, right)? != Greater,
        CompareOp::Gt => value::compare(left, right)? == Greater,
        CompareOp::Ge => value::compare(left, right)? != Less,
        CompareOp::In => value::contains(right, left)?,
        CompareOp::NotIn => !value::contains(right, left)?,
    })
}

fn lookup_attribute(base: &Value, attr: &str) -> Option<Value> {
    match base {
        Value::Object(map) => map.get(attr).cloned(),
        Value::Array(items) => attr.parse::<i64>().ok().and_then(|i| index_array(items, i)),
        _ => None,
    }
}

fn lookup_index(base: &Value, index: &Value) -> Option<Value> {
    match (base, index) {
        (Value::Object(map), Value::String(key)) => map.get(key).cloned(),
        (Value::Object(map), other) => map.get(&to_text(other)).cloned(),
        (Value::Array(items), Value::Number(n)) => n.as_i64().and_then(|i| index_array(items, i)),
        (Value::String(s), Value::Number(n)) => {
            let chars: Vec<char> = s.chars().collect();
            let i = n.as_i64()?;
            let idx = if i < 0 { chars.len() as i64 + i } else { i };
            usize::try_from(idx)
                .ok()
                .and_then(|idx| chars.get(idx))
                .map(|c| Value::String(c.to_string()))
        }
        _ => None,
    }
}

fn index_array(items: &[Value], i: i64) -> Option<Value> {
    let idx = if i < 0 { items.len() as i64 + i } else { i };
    usize::try_from(idx).ok().and_then(|idx| items.get(idx)).cloned()
}
