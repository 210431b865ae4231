//! Attribute expressions for computed classification fields.
//!
//! Grammar:
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := unary (('*' | '/') unary)*
//! unary  := '-' unary | atom
//! atom   := number | 'string' | "field" | field | '(' expr ')'
//! ```
//!
//! Any null operand yields null, as does division by zero.

use crate::error::{ExportError, ExportResult};
use crate::layer::Feature;
use crate::renderer::FieldValue;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(FieldValue),
    Field(String),
    Neg(Box<Expr>),
    Binary(Box<Expr>, BinaryOp, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(FieldValue),
    Str(String),
    Ident(String),
    Op(char),
    LParen,
    RParen,
}

fn parse_error(source: &str, msg: impl std::fmt::Display) -> ExportError {
    ExportError::InvalidRenderer(format!("expression `{source}`: {msg}"))
}

fn tokenize(source: &str) -> ExportResult<Vec<Token>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '+' | '-' | '*' | '/' => {
                tokens.push(Token::Op(c));
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '"' | '\'' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|&q| q == c)
                    .ok_or_else(|| parse_error(source, "unterminated quote"))?;
                let text: String = chars[i + 1..i + 1 + end].iter().collect();
                tokens.push(if c == '"' {
                    Token::Ident(text)
                } else {
                    Token::Str(text)
                });
                i += end + 2;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = if text.contains('.') {
                    text.parse().map(FieldValue::Float).ok()
                } else {
                    text.parse().map(FieldValue::Int).ok()
                };
                tokens.push(Token::Number(
                    value.ok_or_else(|| parse_error(source, format!("bad number {text}")))?,
                ));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(parse_error(source, format!("unexpected `{other}`"))),
        }
    }
    Ok(tokens)
}

struct Parser<'s> {
    source: &'s str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expr(&mut self) -> ExportResult<Expr> {
        let mut lhs = self.term()?;
        while let Some(Token::Op(c @ ('+' | '-'))) = self.peek() {
            let op = if *c == '+' { BinaryOp::Add } else { BinaryOp::Sub };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary(Box::new(lhs), op, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn term(&mut self) -> ExportResult<Expr> {
        let mut lhs = self.unary()?;
        while let Some(Token::Op(c @ ('*' | '/'))) = self.peek() {
            let op = if *c == '*' { BinaryOp::Mul } else { BinaryOp::Div };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary(Box::new(lhs), op, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> ExportResult<Expr> {
        if let Some(Token::Op('-')) = self.peek() {
            self.pos += 1;
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        self.atom()
    }

    fn atom(&mut self) -> ExportResult<Expr> {
        match self.next() {
            Some(Token::Number(v)) => Ok(Expr::Literal(v)),
            Some(Token::Str(s)) => Ok(Expr::Literal(FieldValue::Text(s))),
            Some(Token::Ident(name)) if name.eq_ignore_ascii_case("null") => {
                Ok(Expr::Literal(FieldValue::Null))
            }
            Some(Token::Ident(name)) => Ok(Expr::Field(name)),
            Some(Token::LParen) => {
                let inner = self.expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(parse_error(self.source, "missing `)`")),
                }
            }
            Some(other) => Err(parse_error(self.source, format!("unexpected {other:?}"))),
            None => Err(parse_error(self.source, "unexpected end of input")),
        }
    }
}

impl Expr {
    pub fn parse(source: &str) -> ExportResult<Self> {
        let mut parser = Parser {
            source,
            tokens: tokenize(source)?,
            pos: 0,
        };
        let expr = parser.expr()?;
        if parser.pos < parser.tokens.len() {
            return Err(parse_error(source, "trailing input"));
        }
        Ok(expr)
    }

    pub fn eval(&self, feature: &Feature) -> FieldValue {
        match self {
            Self::Literal(v) => v.clone(),
            Self::Field(name) => feature.attribute(name).clone(),
            Self::Neg(inner) => match inner.eval(feature) {
                FieldValue::Int(i) => i.checked_neg().map_or(FieldValue::Null, FieldValue::Int),
                other => other.as_f64().map_or(FieldValue::Null, |f| FieldValue::Float(-f)),
            },
            Self::Binary(lhs, op, rhs) => apply(*op, lhs.eval(feature), rhs.eval(feature)),
        }
    }
}

fn apply(op: BinaryOp, lhs: FieldValue, rhs: FieldValue) -> FieldValue {
    use FieldValue::{Int, Null, Text};

    match (op, &lhs, &rhs) {
        (_, Null, _) | (_, _, Null) => Null,
        (BinaryOp::Add, Text(a), Text(b)) => Text(format!("{a}{b}")),
        (BinaryOp::Add, Int(a), Int(b)) => a.checked_add(*b).map_or(Null, Int),
        (BinaryOp::Sub, Int(a), Int(b)) => a.checked_sub(*b).map_or(Null, Int),
        (BinaryOp::Mul, Int(a), Int(b)) => a.checked_mul(*b).map_or(Null, Int),
        _ => {
            let (Some(a), Some(b)) = (lhs.as_f64(), rhs.as_f64()) else {
                return Null;
            };
            let v = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div if b == 0.0 => return Null,
                BinaryOp::Div => a / b,
            };
            FieldValue::Float(v)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn feature(attrs: &[(&str, FieldValue)]) -> Feature {
        Feature {
            geometry: serde_json::Value::Null,
            attributes: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn eval(source: &str, f: &Feature) -> FieldValue {
        Expr::parse(source).unwrap().eval(f)
    }

    #[test]
    fn precedence_and_parentheses() {
        let f = feature(&[("a", FieldValue::Int(2)), ("b", FieldValue::Int(3))]);
        assert_eq!(eval("a + b * 4", &f), FieldValue::Int(14));
        assert_eq!(eval("(a + b) * 4", &f), FieldValue::Int(20));
        assert_eq!(eval("-a - 1", &f), FieldValue::Int(-3));
    }

    #[test]
    fn quoted_fields_and_division() {
        let f = feature(&[("pop total", FieldValue::Int(500)), ("area", FieldValue::Float(2.0))]);
        assert_eq!(eval("\"pop total\" / area", &f), FieldValue::Float(250.0));
        assert_eq!(eval("area / 0", &f), FieldValue::Null);
    }

    #[test]
    fn nulls_propagate() {
        let f = feature(&[("a", FieldValue::Int(1))]);
        assert_eq!(eval("a + missing", &f), FieldValue::Null);
        assert_eq!(eval("NULL * 2", &f), FieldValue::Null);
    }

    #[test]
    fn integer_overflow_yields_null() {
        let f = feature(&[("n", FieldValue::Int(i64::MIN)), ("m", FieldValue::Int(i64::MAX))]);
        assert_eq!(eval("-n", &f), FieldValue::Null);
        assert_eq!(eval("m + 1", &f), FieldValue::Null);
    }

    #[test]
    fn strings_concatenate() {
        let f = feature(&[("kind", "road".into())]);
        assert_eq!(eval("kind + '_major'", &f), FieldValue::from("road_major"));
    }

    #[test]
    fn malformed_expressions_are_rejected() {
        assert!(Expr::parse("(a + 1").is_err());
        assert!(Expr::parse("a +").is_err());
        assert!(Expr::parse("a b").is_err());
        assert!(Expr::parse("'open").is_err());
        assert!(Expr::parse("a % 2").is_err());
    }
}
