//! Tokenizer for the expression language.
//!
//! Tokens carry the byte offset where they start so syntax errors can point at
//! the offending position inside the original marker.

use super::ExpressionError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Int(i64),
    Float(f64),
    Str(String),
    Name(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Dot,
    Comma,
    Colon,
    Pipe,
    Tilde,
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    SlashSlash,
    Percent,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub offset: usize,
}

pub(crate) fn tokenize(input: &str) -> Result<Vec<Token>, ExpressionError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        let kind = match c {
            b'(' => single(&mut i, TokenKind::LParen),
            b')' => single(&mut i, TokenKind::RParen),
            b'[' => single(&mut i, TokenKind::LBracket),
            b']' => single(&mut i, TokenKind::RBracket),
            b'{' => single(&mut i, TokenKind::LBrace),
            b'}' => single(&mut i, TokenKind::RBrace),
            b'.' => single(&mut i, TokenKind::Dot),
            b',' => single(&mut i, TokenKind::Comma),
            b':' => single(&mut i, TokenKind::Colon),
            b'|' => single(&mut i, TokenKind::Pipe),
            b'~' => single(&mut i, TokenKind::Tilde),
            b'+' => single(&mut i, TokenKind::Plus),
            b'-' => single(&mut i, TokenKind::Minus),
            b'%' => single(&mut i, TokenKind::Percent),
            b'*' => pair(bytes, &mut i, b'*', TokenKind::StarStar, TokenKind::Star),
            b'/' => pair(bytes, &mut i, b'/', TokenKind::SlashSlash, TokenKind::Slash),
            b'<' => pair(bytes, &mut i, b'=', TokenKind::Le, TokenKind::Lt),
            b'>' => pair(bytes, &mut i, b'=', TokenKind::Ge, TokenKind::Gt),
            b'=' if bytes.get(i + 1) == Some(&b'=') => {
                i += 2;
                TokenKind::Eq
            }
            b'!' if bytes.get(i + 1) == Some(&b'=') => {
                i += 2;
                TokenKind::Ne
            }
            b'"' | b'\'' => {
                let (text, next) = lex_string(input, i)?;
                i = next;
                TokenKind::Str(text)
            }
            b'0'..=b'9' => {
                let (kind, next) = lex_number(input, i)?;
                i = next;
                kind
            }
            c if c == b'_' || c.is_ascii_alphabetic() => {
                while i < bytes.len() && (bytes[i] == b'_' || bytes[i].is_ascii_alphanumeric()) {
                    i += 1;
                }
                TokenKind::Name(input[start..i].to_string())
            }
            _ => {
                let ch = input[i..].chars().next().unwrap_or('?');
                return Err(ExpressionError::syntax(
                    format!("unexpected character '{ch}'"),
                    start,
                ));
            }
        };
        tokens.push(Token {
            kind,
            offset: start,
        });
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        offset: input.len(),
    });
    Ok(tokens)
}

fn single(i: &mut usize, kind: TokenKind) -> TokenKind {
    *i += 1;
    kind
}

fn pair(bytes: &[u8], i: &mut usize, next: u8, double: TokenKind, one: TokenKind) -> TokenKind {
    if bytes.get(*i + 1) == Some(&next) {
        *i += 2;
        double
    } else {
        *i += 1;
        one
    }
}

fn lex_string(input: &str, start: usize) -> Result<(String, usize), ExpressionError> {
    let mut chars = input[start..].char_indices();
    let quote = match chars.next() {
        Some((_, q)) => q,
        None => return Err(ExpressionError::syntax("expected string", start)),
    };
    let mut out = String::new();
    let mut escaped = false;
    for (idx, ch) in chars {
        if escaped {
            out.push(match ch {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                '0' => '\0',
                other => other,
            });
            escaped = false;
            continue;
        }
        if ch == '\\' {
            escaped = true;
        } else if ch == quote {
            return Ok((out, start + idx + ch.len_utf8()));
        } else {
            out.push(ch);
        }
    }
    Err(ExpressionError::syntax("unterminated string literal", start))
}

fn lex_number(input: &str, start: usize) -> Result<(TokenKind, usize), ExpressionError> {
    let bytes = input.as_bytes();
    let mut i = start;
    let mut is_float = false;
    while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'_') {
        i += 1;
    }
    // `items.0.name` must keep the dot as attribute access.
    if i + 1 < bytes.len() && bytes[i] == b'.' && bytes[i + 1].is_ascii_digit() {
        is_float = true;
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        if j < bytes.len() && bytes[j].is_ascii_digit() {
            is_float = true;
            i = j;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
    }

    let text: String = input[start..i].chars().filter(|c| *c != '_').collect();
    let kind = if is_float {
        text.parse::<f64>()
            .map(TokenKind::Float)
            .map_err(|_| ExpressionError::syntax(format!("invalid number '{text}'"), start))?
    } else {
        match text.parse::<i64>() {
            Ok(v) => TokenKind::Int(v),
            Err(_) => text
                .parse::<f64>()
                .map(TokenKind::Float)
                .map_err(|_| ExpressionError::syntax(format!("invalid number '{text}'"), start))?,
        }
    };
    Ok((kind, i))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_operators_and_names() {
        assert_eq!(
            kinds("a.b // 2 ** 3 != 'x'"),
            vec![
                TokenKind::Name("a".into()),
                TokenKind::Dot,
                TokenKind::Name("b".into()),
                TokenKind::SlashSlash,
                TokenKind::Int(2),
                TokenKind::StarStar,
                TokenKind::Int(3),
                TokenKind::Ne,
                TokenKind::Str("x".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn numeric_attribute_keeps_dot() {
        assert_eq!(
            kinds("items.0.name"),
            vec![
                TokenKind::Name("items".into()),
                TokenKind::Dot,
                TokenKind::Int(0),
                TokenKind::Dot,
                TokenKind::Name("name".into()),
                TokenKind::Eof,
            ]
        );
        assert_eq!(kinds("1.5e2"), vec![TokenKind::Float(150.0), TokenKind::Eof]);
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            kinds(r#""a\"b\n""#),
            vec![TokenKind::Str("a\"b\n".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn reports_offsets() {
        let err = tokenize("a $ b").unwrap_err();
        assert_eq!(
            err,
            ExpressionError::Syntax {
                message: "unexpected character '$'".into(),
                position: 2
            }
        );
        assert!(tokenize("'open").is_err());
    }
}
