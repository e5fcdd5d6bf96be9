use std::{cmp::Ordering, fmt};

use crate::{
    error::QueryError,
    fields::{self, FieldRef},
    row::{Row, Value},
};

use super::lexer::{CmpOp, Spanned, Token, tokenize};

/// Deepest run of `(` and `not` a parser accepts.
pub const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Field(FieldRef),
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Cmp {
        lhs: Operand,
        op: CmpOp,
        rhs: Operand,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

/// Why a row could not be evaluated. The row is left out of the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalError {
    Missing(&'static str),
    TypeMismatch,
}

impl Expr {
    pub fn parse(src: &str) -> Result<Expr, QueryError> {
        let tokens = tokenize(src)?;
        if tokens.is_empty() {
            return Err(QueryError::Empty);
        }

        let mut parser = Parser {
            tokens,
            pos: 0,
            end: src.len(),
            depth: 0,
        };
        let expr = parser.or()?;
        match parser.peek() {
            None => Ok(expr),
            Some(_) => Err(QueryError::Trailing(parser.offset())),
        }
    }

    /// `and`/`or` short-circuit left to right, so an error on the right-hand
    /// side only matters when the left-hand side does not decide the result.
    pub fn eval(&self, row: &Row) -> Result<bool, EvalError> {
        match self {
            Expr::Cmp { lhs, op, rhs } => compare(resolve(lhs, row)?, *op, resolve(rhs, row)?),
            Expr::And(a, b) => Ok(a.eval(row)? && b.eval(row)?),
            Expr::Or(a, b) => Ok(a.eval(row)? || b.eval(row)?),
            Expr::Not(e) => Ok(!e.eval(row)?),
        }
    }
}

fn resolve<'a>(operand: &'a Operand, row: &'a Row) -> Result<Value<'a>, EvalError> {
    match operand {
        Operand::Field(field) => row.value(*field).ok_or(EvalError::Missing(field.name())),
        Operand::Number(n) => Ok(Value::Number(*n)),
        Operand::Text(t) => Ok(Value::Text(t)),
    }
}

fn compare(lhs: Value<'_>, op: CmpOp, rhs: Value<'_>) -> Result<bool, EvalError> {
    let ordering = match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(&b).ok_or(EvalError::TypeMismatch)?,
        (Value::Text(a), Value::Text(b)) => a.to_ascii_uppercase().cmp(&b.to_ascii_uppercase()),
        _ => return Err(EvalError::TypeMismatch),
    };

    Ok(match op {
        CmpOp::Lt => ordering == Ordering::Less,
        CmpOp::Le => ordering != Ordering::Greater,
        CmpOp::Gt => ordering == Ordering::Greater,
        CmpOp::Ge => ordering != Ordering::Less,
        CmpOp::Eq => ordering == Ordering::Equal,
        CmpOp::Ne => ordering != Ordering::Equal,
    })
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map(|(_, o)| *o).unwrap_or(self.end)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        self.pos += 1;
        token
    }

    fn expected(&self, expected: &'static str) -> QueryError {
        QueryError::Expected {
            expected,
            offset: self.offset(),
        }
    }

    fn nest(&mut self) -> Result<(), QueryError> {
        if self.depth >= MAX_DEPTH {
            return Err(QueryError::TooDeep {
                offset: self.offset(),
            });
        }
        self.depth += 1;
        Ok(())
    }

    fn or(&mut self) -> Result<Expr, QueryError> {
        let mut lhs = self.and()?;
        while self.peek() == Some(&Token::Or) {
            self.bump();
            let rhs = self.and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr, QueryError> {
        let mut lhs = self.unary()?;
        while self.peek() == Some(&Token::And) {
            self.bump();
            let rhs = self.unary()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, QueryError> {
        if self.peek() == Some(&Token::Not) {
            self.nest()?;
            self.bump();
            let inner = self.unary()?;
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, QueryError> {
        if self.peek() == Some(&Token::LParen) {
            self.nest()?;
            self.bump();
            let inner = self.or()?;
            if self.peek() != Some(&Token::RParen) {
                return Err(self.expected("`)`"));
            }
            self.bump();
            self.depth -= 1;
            return Ok(inner);
        }

        let lhs = self.operand()?;
        let op = match self.peek() {
            Some(Token::Cmp(op)) => *op,
            _ => return Err(self.expected("comparison operator")),
        };
        self.bump();
        let rhs = self.operand()?;

        Ok(Expr::Cmp { lhs, op, rhs })
    }

    fn operand(&mut self) -> Result<Operand, QueryError> {
        let offset = self.offset();
        match self.peek().cloned() {
            Some(Token::Ident(name)) => {
                self.bump();
                fields::resolve(&name)
                    .map(Operand::Field)
                    .ok_or(QueryError::UnknownField { name, offset })
            }
            Some(Token::Number(n)) => {
                self.bump();
                Ok(Operand::Number(n))
            }
            Some(Token::Minus) => {
                self.bump();
                match self.peek() {
                    Some(Token::Number(n)) => {
                        let n = *n;
                        self.bump();
                        Ok(Operand::Number(-n))
                    }
                    _ => Err(self.expected("number")),
                }
            }
            Some(Token::Text(t)) => {
                self.bump();
                Ok(Operand::Text(t))
            }
            _ => Err(self.expected("field, number or quoted text")),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Field(field) => f.write_str(field.name()),
            Operand::Number(n) => write!(f, "{n}"),
            Operand::Text(t) => write!(f, "'{t}'"),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Cmp { lhs, op, rhs } => write!(f, "{lhs} {} {rhs}", op.as_str()),
            Expr::And(a, b) => write!(f, "({a} and {b})"),
            Expr::Or(a, b) => write!(f, "({a} or {b})"),
            Expr::Not(e) => write!(f, "not {e}"),
        }
    }
}
