#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExpressionError {
    #[error("syntax error at offset {position}: {message}")]
    Syntax { message: String, position: usize },
    #[error("unclosed expression marker (missing '}}}}')")]
    Unclosed,
    /// A variable, attribute or index that does not exist in the namespace.
    #[error("'{0}' is undefined")]
    Unresolved(String),
    #[error("type error: {0}")]
    Type(String),
    #[error("unknown filter '{0}'")]
    UnknownFilter(String),
    #[error("unknown test '{0}'")]
    UnknownTest(String),
    #[error("filter '{name}' failed: {message}")]
    Filter { name: String, message: String },
    #[error("division by zero")]
    DivisionByZero,
    #[error("nesting deeper than {0} levels")]
    TooDeep(usize),
}

impl ExpressionError {
    pub(crate) fn syntax(message: impl Into<String>, position: usize) -> Self {
        Self::Syntax {
            message: message.into(),
            position,
        }
    }

    pub(crate) fn filter(name: &str, message: impl Into<String>) -> Self {
        Self::Filter {
            name: name.to_string(),
            message: message.into(),
        }
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, Self::Unresolved(_))
    }
}
