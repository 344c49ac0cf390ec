//! `when` and the three loop keywords, evaluated fresh every time a step runs.

use pitch_core::expressions::value::{is_truthy, type_name};
use pitch_core::expressions::{parse_scalar, ExpressionError, Namespace, Renderer};
use pitch_core::{LoopKind, Step};
use serde_json::{Map, Value};

use crate::executor::ExecutionError;

/// The `when` keyword of one step. Absent means `true`.
#[derive(Debug, Clone, Copy)]
pub struct Conditional<'a> {
    raw: Option<&'a Value>,
}

impl<'a> Conditional<'a> {
    pub fn new(raw: Option<&'a Value>) -> Self {
        Self { raw }
    }

    pub fn of(step: &'a Step) -> Self {
        Self::new(step.when.as_ref())
    }

    /// `false` means the step is skipped; only a malformed expression is an error.
    pub fn evaluate(&self, renderer: &Renderer, namespace: &Namespace) -> Result<bool, ExecutionError> {
        let raw = match self.raw {
            None | Some(Value::Null) => return Ok(true),
            Some(Value::Bool(b)) => return Ok(*b),
            Some(raw) => raw,
        };
        let rendered = renderer.render(raw, namespace)?;
        Ok(match rendered {
            Value::Bool(b) => b,
            Value::String(text) => parse_scalar(&text).is_some_and(|v| is_truthy(&v)),
            other => is_truthy(&other),
        })
    }
}

/// One loop keyword and its raw value.
#[derive(Debug, Clone, Copy)]
pub struct Loop<'a> {
    kind: LoopKind,
    raw: &'a Value,
}

impl<'a> Loop<'a> {
    pub fn new(kind: LoopKind, raw: &'a Value) -> Self {
        Self { kind, raw }
    }

    pub fn of(step: &'a Step) -> Option<Self> {
        step.loop_directive().map(|(kind, raw)| Self::new(kind, raw))
    }

    pub fn kind(&self) -> LoopKind {
        self.kind
    }

    /// Values bound to `item`, one per iteration, in iteration order.
    pub fn evaluate(
        &self,
        renderer: &Renderer,
        namespace: &Namespace,
        max_items: usize,
    ) -> Result<Vec<Value>, ExecutionError> {
        let items = match self.kind {
            LoopKind::Items => resolve_collection(self.raw, renderer, namespace)?,
            LoopKind::IndexedItems => resolve_collection(self.raw, renderer, namespace)?
                .into_iter()
                .enumerate()
                .map(|(i, v)| Value::Array(vec![Value::from(i), v]))
                .collect(),
            LoopKind::Nested => {
                let sources = resolve_collection(self.raw, renderer, namespace)?;
                let mut lists = Vec::with_capacity(sources.len());
                for source in &sources {
                    // Elements were rendered already; a string still names a collection.
                    lists.push(resolve_collection(source, renderer, namespace)?);
                }
                product(&lists, self.kind, max_items)?
            }
        };
        if items.len() > max_items {
            return Err(ExecutionError::LoopTooLarge {
                keyword: self.kind.keyword(),
                limit: max_items,
            });
        }
        Ok(items)
    }
}

/// Renders a loop source and turns it into a list.
///
/// A string may render to the collection itself, name a collection in the
/// namespace, or hold a literal YAML list. `null` is an empty collection.
pub fn resolve_collection(
    raw: &Value,
    renderer: &Renderer,
    namespace: &Namespace,
) -> Result<Vec<Value>, ExecutionError> {
    let rendered = renderer.render_nested(raw, namespace)?;
    let rendered = match rendered {
        Value::String(text) => match renderer.lookup(text.trim(), namespace) {
            Some(found @ (Value::Array(_) | Value::Object(_) | Value::Null)) => found,
            _ => parse_scalar(&text).unwrap_or(Value::String(text)),
        },
        other => other,
    };
    match rendered {
        Value::Array(items) => Ok(items),
        Value::Object(map) => Ok(keys(map)),
        Value::Null => Ok(Vec::new()),
        other => Err(ExpressionError::Type(format!(
            "loop source must be a list, got {} ({other})",
            type_name(&other)
        ))
        .into()),
    }
}

fn keys(map: Map<String, Value>) -> Vec<Value> {
    map.into_iter().map(|(k, _)| Value::String(k)).collect()
}

/// Cartesian product, rightmost list varying fastest. A single list is not wrapped.
fn product(lists: &[Vec<Value>], kind: LoopKind, max_items: usize) -> Result<Vec<Value>, ExecutionError> {
    if lists.is_empty() {
        return Ok(Vec::new());
    }
    if let [single] = lists {
        return Ok(single.clone());
    }
    let total = lists
        .iter()
        .try_fold(1usize, |acc, l| acc.checked_mul(l.len()))
        .filter(|n| *n <= max_items)
        .ok_or(ExecutionError::LoopTooLarge {
            keyword: kind.keyword(),
            limit: max_items,
        })?;

    let mut out: Vec<Vec<Value>> = vec![Vec::with_capacity(lists.len())];
    for list in lists {
        let mut next = Vec::with_capacity(out.len() * list.len());
        for prefix in &out {
            for value in list {
                let mut combo = prefix.clone();
                combo.push(value.clone());
                next.push(combo);
            }
        }
        out = next;
    }
    debug_assert_eq!(out.len(), total);
    Ok(out.into_iter().map(Value::Array).collect())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn ns(value: Value) -> Namespace {
        value.as_object().cloned().unwrap_or_default()
    }

    fn items(kind: LoopKind, raw: Value, namespace: Value) -> Result<Vec<Value>, ExecutionError> {
        Loop::new(kind, &raw).evaluate(&Renderer::default(), &ns(namespace), 1000)
    }

    #[test]
    fn conditional_literals_and_rendered_text() {
        let r = Renderer::default();
        let n = ns(json!({"enabled": "yes", "count": 0, "flag": false}));
        let eval = |v: Value| Conditional::new(Some(&v)).evaluate(&r, &n).unwrap();
        assert!(Conditional::new(None).evaluate(&r, &n).unwrap());
        assert!(!eval(json!(false)));
        assert!(eval(json!("{{ enabled }}")));
        assert!(!eval(json!("{{ count > 1 }}")));
        assert!(!eval(json!("{{ flag }}")));
        assert!(!eval(json!("no")));
    }

    #[test]
    fn conditional_errors_are_not_swallowed() {
        let raw = json!("{{ missing.value }}");
        let err = Conditional::new(Some(&raw))
            .evaluate(&Renderer::default(), &Namespace::new())
            .unwrap_err();
        assert!(matches!(err, ExecutionError::Expression(ExpressionError::Unresolved(_))));
    }

    #[test]
    fn items_from_literal_variable_name_or_template() {
        let vars = json!({"users": ["a", "b"], "empty": []});
        assert_eq!(items(LoopKind::Items, json!(["x", "{{ users[1] }}"]), vars.clone()).unwrap(), vec![json!("x"), json!("b")]);
        assert_eq!(items(LoopKind::Items, json!("users"), vars.clone()).unwrap(), vec![json!("a"), json!("b")]);
        assert_eq!(items(LoopKind::Items, json!("{{ users }}"), vars.clone()).unwrap().len(), 2);
        assert_eq!(items(LoopKind::Items, json!("[1, 2, 3]"), vars.clone()).unwrap().len(), 3);
        assert!(items(LoopKind::Items, json!("empty"), vars.clone()).unwrap().is_empty());
        assert!(items(LoopKind::Items, json!(7), vars).is_err());
    }

    #[test]
    fn indexed_items_are_zero_based_pairs() {
        assert_eq!(
            items(LoopKind::IndexedItems, json!(["x", "y"]), json!({})).unwrap(),
            vec![json!([0, "x"]), json!([1, "y"])]
        );
    }

    #[test]
    fn nested_product_order_and_single_list_flattening() {
        assert_eq!(
            items(LoopKind::Nested, json!([[1, 2], ["a", "b"]]), json!({})).unwrap(),
            vec![json!([1, "a"]), json!([1, "b"]), json!([2, "a"]), json!([2, "b"])]
        );
        assert_eq!(
            items(LoopKind::Nested, json!([["a", "b"]]), json!({})).unwrap(),
            vec![json!("a"), json!("b")]
        );
        assert_eq!(
            items(LoopKind::Nested, json!(["ids", [true]]), json!({"ids": [1, 2]})).unwrap(),
            vec![json!([1, true]), json!([2, true])]
        );
        assert!(items(LoopKind::Nested, json!([]), json!({})).unwrap().is_empty());
    }

    #[test]
    fn oversized_products_fail_fast() {
        let big: Vec<u32> = (0..100).collect();
        let raw = json!([big, big, big]);
        let err = Loop::new(LoopKind::Nested, &raw)
            .evaluate(&Renderer::default(), &Namespace::new(), 1000)
            .unwrap_err();
        assert!(matches!(err, ExecutionError::LoopTooLarge { keyword: "with_nested", .. }));
    }
}
