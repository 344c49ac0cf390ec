#![forbid(unsafe_code)]

pub mod error;
pub mod expressions;
pub mod parser;
pub mod types;
pub mod validate;

pub use crate::error::{ParseError, SequenceError, ValidationError, Violation};
pub use crate::expressions::{
    Environment, Expression, ExpressionError, Namespace, Renderer, Template,
};
pub use crate::parser::{load_sequence, parse_sequence_str, DocumentFormat, ParsedSequence};
pub use crate::types::{LoopKind, PluginInvocation, Sequence, Step};
pub use crate::validate::{validate_sequence, Validate};
