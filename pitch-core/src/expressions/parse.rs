use serde_json::Value;

use super::ast::{BinaryOp, CompareOp, Expr};
use super::lexer::{tokenize, Token, TokenKind};
use super::ExpressionError;

const MAX_DEPTH: usize = 64;

pub(crate) fn parse_expression(input: &str) -> Result<Expr, ExpressionError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    if parser.peek() == &TokenKind::Eof {
        return Err(ExpressionError::syntax("empty expression", 0));
    }
    let expr = parser.expression()?;
    match parser.peek() {
        TokenKind::Eof => Ok(expr),
        other => Err(ExpressionError::syntax(
            format!("unexpected token {other:?}"),
            parser.offset(),
        )),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &TokenKind {
        self.peek_at(0)
    }

    fn peek_at(&self, ahead: usize) -> &TokenKind {
        let idx = (self.pos + ahead).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn offset(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].offset
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.is_keyword(0, keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn is_keyword(&self, ahead: usize, keyword: &str) -> bool {
        matches!(self.peek_at(ahead), TokenKind::Name(n) if n == keyword)
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<(), ExpressionError> {
        if self.eat(&kind) {
            Ok(())
        } else {
            Err(ExpressionError::syntax(
                format!("expected {what}, found {:?}", self.peek()),
                self.offset(),
            ))
        }
    }

    fn expect_name(&mut self, what: &str) -> Result<String, ExpressionError> {
        match self.peek().clone() {
            TokenKind::Name(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(ExpressionError::syntax(
                format!("expected {what}, found {other:?}"),
                self.offset(),
            )),
        }
    }

    fn descend(&mut self) -> Result<(), ExpressionError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExpressionError::TooDeep(MAX_DEPTH));
        }
        Ok(())
    }

    fn expression(&mut self) -> Result<Expr, ExpressionError> {
        self.descend()?;
        let then = self.or_expr()?;
        let expr = if self.eat_keyword("if") {
            let condition = self.or_expr()?;
            let otherwise = if self.eat_keyword("else") {
                Some(Box::new(self.expression()?))
            } else {
                None
            };
            Expr::Conditional {
                then: Box::new(then),
                condition: Box::new(condition),
                otherwise,
            }
        } else {
            then
        };
        self.depth -= 1;
        Ok(expr)
    }

    fn or_expr(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.and_expr()?;
        while self.eat_keyword("or") {
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.not_expr()?;
        while self.eat_keyword("and") {
            let right = self.not_expr()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr, ExpressionError> {
        if self.is_keyword(0, "not") && !self.is_keyword(1, "in") {
            self.advance();
            self.descend()?;
            let inner = self.not_expr()?;
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, ExpressionError> {
        let first = self.math1()?;
        let mut rest = Vec::new();
        loop {
            let op = match self.peek() {
                TokenKind::Eq => CompareOp::Eq,
                TokenKind::Ne => CompareOp::Ne,
                TokenKind::Lt => CompareOp::Lt,
                TokenKind::Le => CompareOp::Le,
                TokenKind::Gt => CompareOp::Gt,
                TokenKind::Ge => CompareOp::Ge,
                TokenKind::Name(n) if n == "in" => CompareOp::In,
                TokenKind::Name(n) if n == "not" && self.is_keyword(1, "in") => {
                    self.advance();
                    CompareOp::NotIn
                }
                _ => break,
            };
            self.advance();
            rest.push((op, self.math1()?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare(Box::new(first), rest))
        }
    }

    fn math1(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.concat()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.concat()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn concat(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.math2()?;
        while self.eat(&TokenKind::Tilde) {
            let right = self.math2()?;
            left = Expr::Binary(BinaryOp::Concat, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn math2(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.power()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::SlashSlash => BinaryOp::FloorDiv,
                TokenKind::Percent => BinaryOp::Rem,
                _ => break,
            };
            self.advance();
            let right = self.power()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn power(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.unary()?;
        while self.eat(&TokenKind::StarStar) {
            let right = self.unary()?;
            left = Expr::Binary(BinaryOp::Pow, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, ExpressionError> {
        match self.peek() {
            TokenKind::Minus => {
                self.advance();
                self.descend()?;
                let inner = self.unary()?;
                self.depth -= 1;
                Ok(Expr::Negate(Box::new(inner)))
            }
            TokenKind::Plus => {
                self.advance();
                self.unary()
            }
            _ => self.postfix(),
        }
    }

    fn postfix(&mut self) -> Result<Expr, ExpressionError> {
        let mut expr = self.primary()?;
        loop {
            match self.peek().clone() {
                TokenKind::Dot => {
                    self.advance();
                    expr = match self.advance() {
                        TokenKind::Name(name) => Expr::Attribute(Box::new(expr), name),
                        TokenKind::Int(i) => {
                            Expr::Index(Box::new(expr), Box::new(Expr::Literal(Value::from(i))))
                        }
                        other => {
                            return Err(ExpressionError::syntax(
                                format!("expected attribute name, found {other:?}"),
                                self.offset(),
                            ))
                        }
                    };
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.expression()?;
                    self.expect(TokenKind::RBracket, "']'")?;
                    expr = Expr::Index(Box::new(expr), Box::new(index));
                }
                TokenKind::Pipe => {
                    self.advance();
                    let name = self.expect_name("filter name")?;
                    let args = self.call_args()?;
                    expr = Expr::Filter {
                        input: Box::new(expr),
                        name,
                        args,
                    };
                }
                TokenKind::Name(n) if n == "is" => {
                    self.advance();
                    let negated = self.eat_keyword("not");
                    let name = self.test_name()?;
                    let args = self.call_args()?;
                    expr = Expr::Test {
                        input: Box::new(expr),
                        name,
                        args,
                        negated,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn test_name(&mut self) -> Result<String, ExpressionError> {
        // `x is none` / `x is true` use keywords as test names.
        self.expect_name("test name")
    }

    fn call_args(&mut self) -> Result<Vec<Expr>, ExpressionError> {
        if !self.eat(&TokenKind::LParen) {
            return Ok(Vec::new());
        }
        let mut args = Vec::new();
        if self.eat(&TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            if self.eat(&TokenKind::Comma) {
                if self.eat(&TokenKind::RParen) {
                    return Ok(args);
                }
                continue;
            }
            self.expect(TokenKind::RParen, "')'")?;
            return Ok(args);
        }
    }

    fn primary(&mut self) -> Result<Expr, ExpressionError> {
        let offset = self.offset();
        match self.advance() {
            TokenKind::Int(i) => Ok(Expr::Literal(Value::from(i))),
            TokenKind::Float(f) => serde_json::Number::from_f64(f)
                .map(|n| Expr::Literal(Value::Number(n)))
                .ok_or_else(|| ExpressionError::syntax("number out of range", offset)),
            TokenKind::Str(s) => Ok(Expr::Literal(Value::String(s))),
            TokenKind::Name(name) => Ok(match name.as_str() {
                "true" | "True" => Expr::Literal(Value::Bool(true)),
                "false" | "False" => Expr::Literal(Value::Bool(false)),
                "none" | "None" | "null" => Expr::Literal(Value::Null),
                _ => Expr::Variable(name),
            }),
            TokenKind::LParen => {
                let inner = self.expression()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::LBracket => {
                let mut items = Vec::new();
                while !self.eat(&TokenKind::RBracket) {
                    items.push(self.expression()?);
                    if !self.eat(&TokenKind::Comma) {
                        self.expect(TokenKind::RBracket, "']'")?;
                        break;
                    }
                }
                Ok(Expr::List(items))
            }
            TokenKind::LBrace => {
                let mut entries = Vec::new();
                while !self.eat(&TokenKind::RBrace) {
                    let key = self.expression()?;
                    self.expect(TokenKind::Colon, "':'")?;
                    let value = self.expression()?;
                    entries.push((key, value));
                    if !self.eat(&TokenKind::Comma) {
                        self.expect(TokenKind::RBrace, "'}'")?;
                        break;
                    }
                }
                Ok(Expr::Mapping(entries))
            }
            TokenKind::Eof => Err(ExpressionError::syntax("unexpected end of expression", offset)),
            other => Err(ExpressionError::syntax(
                format!("unexpected token {other:?}"),
                offset,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn var(name: &str) -> Box<Expr> {
        Box::new(Expr::Variable(name.to_string()))
    }

    #[test]
    fn precedence_of_arithmetic() {
        let expr = parse_expression("1 + 2 * 3").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Add,
                Box::new(Expr::Literal(json!(1))),
                Box::new(Expr::Binary(
                    BinaryOp::Mul,
                    Box::new(Expr::Literal(json!(2))),
                    Box::new(Expr::Literal(json!(3)))
                ))
            )
        );
    }

    #[test]
    fn attribute_index_and_filter_chain() {
        let expr = parse_expression("response.as_json['ids'][0] | default(1)").unwrap();
        match expr {
            Expr::Filter { name, args, input } => {
                assert_eq!(name, "default");
                assert_eq!(args, vec![Expr::Literal(json!(1))]);
                assert_eq!(input.describe(), "response.as_json[\"ids\"][0]");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn not_in_and_negated_tests() {
        assert!(matches!(
            parse_expression("a not in b").unwrap(),
            Expr::Compare(_, ref ops) if ops[0].0 == CompareOp::NotIn
        ));
        assert_eq!(
            parse_expression("x is not defined").unwrap(),
            Expr::Test {
                input: var("x"),
                name: "defined".into(),
                args: vec![],
                negated: true
            }
        );
        assert_eq!(
            parse_expression("not x").unwrap(),
            Expr::Not(var("x"))
        );
    }

    #[test]
    fn inline_conditional() {
        assert!(matches!(
            parse_expression("'a' if flag else 'b'").unwrap(),
            Expr::Conditional { otherwise: Some(_), .. }
        ));
    }

    #[test]
    fn literals() {
        assert_eq!(
            parse_expression("[1, 'two', {'k': none}, True]").unwrap(),
            Expr::List(vec![
                Expr::Literal(json!(1)),
                Expr::Literal(json!("two")),
                Expr::Mapping(vec![(Expr::Literal(json!("k")), Expr::Literal(json!(null)))]),
                Expr::Literal(json!(true)),
            ])
        );
    }

    #[test]
    fn rejects_trailing_tokens_and_empty_input() {
        assert!(parse_expression("a b").is_err());
        assert!(parse_expression("   ").is_err());
        assert!(parse_expression("(1 + ").is_err());
    }

    #[test]
    fn guards_against_runaway_nesting() {
        let deep = format!("{}1{}", "(".repeat(200), ")".repeat(200));
        assert_eq!(parse_expression(&deep), Err(ExpressionError::TooDeep(MAX_DEPTH)));
    }
}
