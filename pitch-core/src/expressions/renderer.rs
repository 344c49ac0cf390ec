use std::sync::Arc;

use serde_json::{Map, Value};

use super::ast::Expr;
use super::environment::Environment;
use super::eval::Evaluator;
use super::parse::parse_expression;
use super::template::{has_markers, Template};
use super::{ExpressionError, Namespace};

/// Deepest mapping/sequence nesting `render_nested` descends into.
pub const MAX_NESTING_DEPTH: usize = 128;

/// A bare expression without `{{ }}` markers, e.g. a loop collection name.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    expr: Expr,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        Ok(Self {
            source: source.trim().to_string(),
            expr: parse_expression(source)?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn evaluate(&self, env: &Environment, namespace: &Namespace) -> Result<Value, ExpressionError> {
        Evaluator { env, namespace }.eval(&self.expr)
    }
}

/// Renders template strings and whole value trees against a namespace.
///
/// Cloning is cheap; the environment is shared.
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    env: Arc<Environment>,
}

impl Renderer {
    pub fn new(env: Arc<Environment>) -> Self {
        Self { env }
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Renders one string. Strings without markers come back unchanged.
    pub fn render_str(&self, source: &str, namespace: &Namespace) -> Result<Value, ExpressionError> {
        if !has_markers(source) {
            return Ok(Value::String(source.to_string()));
        }
        Template::parse(source)?.render(&self.env, namespace)
    }

    /// Renders a scalar leaf. Only strings are templated; everything else is cloned.
    pub fn render(&self, value: &Value, namespace: &Namespace) -> Result<Value, ExpressionError> {
        match value {
            Value::String(s) => self.render_str(s, namespace),
            other => Ok(other.clone()),
        }
    }

    /// Like [`render`](Self::render) but an undefined reference yields `default`.
    pub fn render_with_default(
        &self,
        value: &Value,
        namespace: &Namespace,
        default: Value,
    ) -> Result<Value, ExpressionError> {
        match self.render(value, namespace) {
            Err(e) if e.is_unresolved() => Ok(default),
            other => other,
        }
    }

    /// Builds a fresh tree where every string leaf reachable through mappings and
    /// sequences has been rendered. Mapping keys are left as written.
    pub fn render_nested(&self, value: &Value, namespace: &Namespace) -> Result<Value, ExpressionError> {
        self.render_nested_at(value, namespace, 0)
    }

    pub fn render_map(
        &self,
        map: &Map<String, Value>,
        namespace: &Namespace,
    ) -> Result<Map<String, Value>, ExpressionError> {
        let mut out = Map::new();
        for (k, v) in map {
            out.insert(k.clone(), self.render_nested_at(v, namespace, 1)?);
        }
        Ok(out)
    }

    fn render_nested_at(
        &self,
        value: &Value,
        namespace: &Namespace,
        depth: usize,
    ) -> Result<Value, ExpressionError> {
        if depth > MAX_NESTING_DEPTH {
            return Err(ExpressionError::TooDeep(MAX_NESTING_DEPTH));
        }
        match value {
            Value::Array(items) => items
                .iter()
                .map(|v| self.render_nested_at(v, namespace, depth + 1))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(map) => {
                let mut out = Map::new();
                for (k, v) in map {
                    out.insert(k.clone(), self.render_nested_at(v, namespace, depth + 1)?);
                }
                Ok(Value::Object(out))
            }
            leaf => self.render(leaf, namespace),
        }
    }

    /// Evaluates a bare expression.
    pub fn evaluate(&self, source: &str, namespace: &Namespace) -> Result<Value, ExpressionError> {
        Expression::parse(source)?.evaluate(&self.env, namespace)
    }

    /// Resolves `source` as a bare expression, `None` when it does not name
    /// anything in the namespace or is not an expression at all.
    pub fn lookup(&self, source: &str, namespace: &Namespace) -> Option<Value> {
        self.evaluate(source, namespace).ok()
    }
}
