//! Text syntax for expressions.
//!
//! ```text
//! relation := sum (("<=" | ">=" | "=" | "==") sum)?
//! sum      := product (("+" | "-") product)*
//! product  := unary (("*" | "/") unary)*
//! unary    := "-" unary | power
//! power    := atom ("^" unary)?
//! atom     := number | "pi" | ident | ident "(" args ")" | "(" sum ")"
//! ```
//!
//! Function calls resolve first to intrinsic math functions, then to surrogates registered in
//! the supplied [`SurrogateRegistry`].

use super::{BinaryOp, Expr, MathFn, Relation, SurrogateRegistry};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unexpected character '{ch}' at offset {offset}")]
    UnexpectedCharacter { offset: usize, ch: char },

    #[error("Unexpected token '{found}' at offset {offset}")]
    UnexpectedToken { offset: usize, found: String },

    #[error("Unexpected end of expression")]
    UnexpectedEnd,

    #[error("Invalid number '{text}' at offset {offset}")]
    InvalidNumber { offset: usize, text: String },

    #[error("Unknown function '{name}' at offset {offset}")]
    UnknownFunction { offset: usize, name: String },

    #[error("Function '{name}' expects {expected} argument(s), got {actual}")]
    Arity {
        name: String,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    Comma,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(v) => v.to_string(),
            Token::Ident(name) => name.clone(),
            Token::Op(op) => op.to_string(),
            Token::LParen => "(".to_string(),
            Token::RParen => ")".to_string(),
            Token::Comma => ",".to_string(),
        }
    }
}

fn tokenize(text: &str) -> Result<Vec<(usize, Token)>, ParseError> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        if c.is_ascii_digit() || (c == '.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)) {
            while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                i += 1;
            }
            if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
                let mut j = i + 1;
                if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
                    j += 1;
                }
                if j < bytes.len() && bytes[j].is_ascii_digit() {
                    i = j;
                    while i < bytes.len() && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let literal = &text[start..i];
            let value = literal
                .parse::<f64>()
                .map_err(|_| ParseError::InvalidNumber {
                    offset: start,
                    text: literal.to_string(),
                })?;
            tokens.push((start, Token::Number(value)));
            continue;
        }
        if c.is_ascii_alphabetic() || c == '_' {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            tokens.push((start, Token::Ident(text[start..i].to_string())));
            continue;
        }
        let two = text.get(i..i + 2);
        let token = match (c, two) {
            (_, Some("<=")) => Token::Op("<="),
            (_, Some(">=")) => Token::Op(">="),
            (_, Some("==")) => Token::Op("="),
            ('=', _) => Token::Op("="),
            ('+', _) => Token::Op("+"),
            ('-', _) => Token::Op("-"),
            ('*', _) => Token::Op("*"),
            ('/', _) => Token::Op("/"),
            ('^', _) => Token::Op("^"),
            ('(', _) => Token::LParen,
            (')', _) => Token::RParen,
            (',', _) => Token::Comma,
            _ => {
                let ch = text[i..].chars().next().unwrap_or(c);
                return Err(ParseError::UnexpectedCharacter { offset: i, ch });
            }
        };
        i += match token {
            Token::Op("<=") | Token::Op(">=") => 2,
            Token::Op("=") if two == Some("==") => 2,
            _ => 1,
        };
        tokens.push((start, token));
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    registry: &'a SurrogateRegistry,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn next(&mut self) -> Option<(usize, Token)> {
        let item = self.tokens.get(self.pos).cloned();
        if item.is_some() {
            self.pos += 1;
        }
        item
    }

    fn unexpected(&self) -> ParseError {
        match self.tokens.get(self.pos) {
            Some((offset, token)) => ParseError::UnexpectedToken {
                offset: *offset,
                found: token.describe(),
            },
            None => ParseError::UnexpectedEnd,
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParseError> {
        if self.peek() == Some(&expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn relation(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.sum()?;
        let rel = match self.peek() {
            Some(Token::Op("<=")) => Relation::Le,
            Some(Token::Op(">=")) => Relation::Ge,
            Some(Token::Op("=")) => Relation::Eq,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.sum()?;
        Ok(Expr::compare(rel, lhs, rhs))
    }

    fn sum(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.product()?;
        loop {
            let op = match self.peek() {
                Some(Token::Op("+")) => BinaryOp::Add,
                Some(Token::Op("-")) => BinaryOp::Sub,
                _ => return Ok(expr),
            };
            self.pos += 1;
            expr = Expr::binary(op, expr, self.product()?);
        }
    }

    fn product(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Op("*")) => BinaryOp::Mul,
                Some(Token::Op("/")) => BinaryOp::Div,
                _ => return Ok(expr),
            };
            self.pos += 1;
            expr = Expr::binary(op, expr, self.unary()?);
        }
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        if self.peek() == Some(&Token::Op("-")) {
            self.pos += 1;
            return Ok(-self.unary()?);
        }
        self.power()
    }

    fn power(&mut self) -> Result<Expr, ParseError> {
        let base = self.atom()?;
        if self.peek() == Some(&Token::Op("^")) {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(Expr::binary(BinaryOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Expr, ParseError> {
        let (offset, token) = self.next().ok_or(ParseError::UnexpectedEnd)?;
        match token {
            Token::Number(v) => Ok(Expr::Literal(v)),
            Token::LParen => {
                let inner = self.sum()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::Ident(name) if self.peek() == Some(&Token::LParen) => {
                self.pos += 1;
                let args = self.arguments()?;
                self.function_call(offset, name, args)
            }
            Token::Ident(name) if name == "pi" => Ok(Expr::Literal(std::f64::consts::PI)),
            Token::Ident(name) => Ok(Expr::Unknown(name)),
            other => Err(ParseError::UnexpectedToken {
                offset,
                found: other.describe(),
            }),
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.sum()?);
            match self.next() {
                Some((_, Token::Comma)) => continue,
                Some((_, Token::RParen)) => return Ok(args),
                Some((offset, token)) => {
                    return Err(ParseError::UnexpectedToken {
                        offset,
                        found: token.describe(),
                    });
                }
                None => return Err(ParseError::UnexpectedEnd),
            }
        }
    }

    fn function_call(
        &self,
        offset: usize,
        name: String,
        mut args: Vec<Expr>,
    ) -> Result<Expr, ParseError> {
        if let Some(func) = MathFn::from_name(&name) {
            if args.len() != 1 {
                return Err(ParseError::Arity {
                    name,
                    expected: 1,
                    actual: args.len(),
                });
            }
            return Ok(Expr::func(func, args.remove(0)));
        }
        if name == "pow" {
            if args.len() != 2 {
                return Err(ParseError::Arity {
                    name,
                    expected: 2,
                    actual: args.len(),
                });
            }
            let exponent = args.remove(1);
            let base = args.remove(0);
            return Ok(Expr::binary(BinaryOp::Pow, base, exponent));
        }
        let surrogate = self
            .registry
            .get(&name)
            .ok_or_else(|| ParseError::UnknownFunction {
                offset,
                name: name.clone(),
            })?;
        if surrogate.arity() != args.len() {
            return Err(ParseError::Arity {
                name,
                expected: surrogate.arity(),
                actual: args.len(),
            });
        }
        Ok(Expr::call(surrogate.clone(), args))
    }
}

/// Parses `text` into an expression tree, resolving surrogate calls through `registry`.
pub fn parse(text: &str, registry: &SurrogateRegistry) -> Result<Expr, ParseError> {
    let tokens = tokenize(text)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        registry,
    };
    let expr = parser.relation()?;
    if parser.pos != parser.tokens.len() {
        return Err(parser.unexpected());
    }
    Ok(expr)
}
