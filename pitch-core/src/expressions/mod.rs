//! The template/expression language.
//!
//! Templates are strings with `{{ expression }}` markers. Expressions support
//! variable, attribute and index access, arithmetic, comparisons, boolean logic,
//! `~` string concatenation, inline `if`/`else`, and named filters and tests
//! registered in an [`Environment`].

mod ast;
mod builtins;
mod environment;
mod error;
mod eval;
mod lexer;
mod parse;
mod renderer;
mod scalar;
mod template;
pub mod value;

pub use environment::{Environment, FilterFn, TestFn};
pub use error::ExpressionError;
pub use renderer::{Expression, Renderer, MAX_NESTING_DEPTH};
pub use scalar::parse_scalar;
pub use template::{has_markers, Template};

/// The variables visible to an expression.
pub type Namespace = serde_json::Map<String, serde_json::Value>;
