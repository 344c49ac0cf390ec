use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Rem,
    Pow,
    Concat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal(Value),
    Variable(String),
    Attribute(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    List(Vec<Expr>),
    Mapping(Vec<(Expr, Expr)>),
    Negate(Box<Expr>),
    Not(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    /// `a < b <= c` chains; every pair must hold.
    Compare(Box<Expr>, Vec<(CompareOp, Expr)>),
    Conditional {
        then: Box<Expr>,
        condition: Box<Expr>,
        otherwise: Option<Box<Expr>>,
    },
    Filter {
        input: Box<Expr>,
        name: String,
        args: Vec<Expr>,
    },
    Test {
        input: Box<Expr>,
        name: String,
        args: Vec<Expr>,
        negated: bool,
    },
}

impl Expr {
    /// Dotted path used in "undefined" error messages, e.g. `response.as_json.token`.
    pub(crate) fn describe(&self) -> String {
        match self {
            Expr::Variable(name) => name.clone(),
            Expr::Attribute(base, attr) => format!("{}.{attr}", base.describe()),
            Expr::Index(base, index) => match index.as_ref() {
                Expr::Literal(v) => format!("{}[{v}]", base.describe()),
                _ => format!("{}[...]", base.describe()),
            },
            Expr::Filter { input, name, .. } => format!("{} | {name}", input.describe()),
            _ => "<expression>".to_string(),
        }
    }
}
