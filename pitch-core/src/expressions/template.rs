use serde_json::Value;

use super::ast::Expr;
use super::environment::Environment;
use super::eval::Evaluator;
use super::parse::parse_expression;
use super::value::to_text;
use super::{ExpressionError, Namespace};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Expr { source: String, expr: Expr },
}

/// A string with embedded `{{ expression }}` markers.
///
/// Parsing happens once; rendering never mutates the template, so the same
/// template can be rendered for every loop iteration independently.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

/// Cheap check used to skip parsing for plain strings.
pub fn has_markers(s: &str) -> bool {
    s.contains(OPEN)
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        let mut segments = Vec::new();
        let mut rest = source;
        let mut consumed = 0;

        while let Some(start) = rest.find(OPEN) {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }
            let inner_start = start + OPEN.len();
            let inner_len = find_close(&rest[inner_start..]).ok_or(ExpressionError::Unclosed)?;
            let inner = &rest[inner_start..inner_start + inner_len];
            let expr = parse_expression(inner).map_err(|e| shift(e, consumed + inner_start))?;
            segments.push(Segment::Expr {
                source: inner.trim().to_string(),
                expr,
            });
            let next = inner_start + inner_len + CLOSE.len();
            consumed += next;
            rest = &rest[next..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// True when the template has no markers and renders to its own source.
    pub fn is_literal(&self) -> bool {
        self.segments.iter().all(|s| matches!(s, Segment::Literal(_)))
    }

    /// Source text of every embedded expression, in order.
    pub fn expressions(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Expr { source, .. } => Some(source.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// A template made of exactly one marker yields the native value; anything
    /// else is rendered to a string.
    pub fn render(&self, env: &Environment, namespace: &Namespace) -> Result<Value, ExpressionError> {
        let evaluator = Evaluator { env, namespace };
        if let [Segment::Expr { expr, .. }] = self.segments.as_slice() {
            return evaluator.eval(expr);
        }
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Expr { expr, .. } => out.push_str(&to_text(&evaluator.eval(expr)?)),
            }
        }
        Ok(Value::String(out))
    }
}

impl std::fmt::Display for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

/// Offset of the closing marker, skipping over quoted string literals.
fn find_close(input: &str) -> Option<usize> {
    let bytes = input.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        match quote {
            Some(q) => {
                if c == b'\\' {
                    i += 1;
                } else if c == q {
                    quote = None;
                }
            }
            None => {
                if c == b'"' || c == b'\'' {
                    quote = Some(c);
                } else if bytes[i..].starts_with(CLOSE.as_bytes()) {
                    return Some(i);
                }
            }
        }
        i += 1;
    }
    None
}

fn shift(err: ExpressionError, by: usize) -> ExpressionError {
    match err {
        ExpressionError::Syntax { message, position } => ExpressionError::Syntax {
            message,
            position: position + by,
        },
        other => other,
    }
}
