//! Recursive-descent formula parser.
//!
//! ```text
//! expr    := term (("+" | "-") term)*
//! term    := unary (("*" | "/") unary)*
//! unary   := ("-" | "+") unary | power
//! power   := primary ("^" unary)?
//! primary := NUMBER | NAME | QUOTED | "$" DIGITS
//!          | NAME "(" [expr ("," expr)*] ")" | "(" expr ")"
//! ```

use super::ast::{BinaryOp, Expr};
use super::error::FormulaError;
use super::lexer::{Spanned, Token, tokenize};
use crate::builtins;

/// Parse formula text into an unresolved tree.
pub fn parse_formula(input: &str) -> Result<Expr, FormulaError> {
    if input.trim().is_empty() {
        return Err(FormulaError::new("empty formula", 0));
    }
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        end: input.len(),
    };
    let expr = parser.expr()?;
    if let Some(extra) = parser.peek() {
        return Err(FormulaError::new(
            "unexpected trailing input",
            extra.offset,
        ));
    }
    Ok(expr)
}

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    end: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Spanned> {
        self.tokens.get(self.pos)
    }

    fn offset(&self) -> usize {
        self.peek().map_or(self.end, |t| t.offset)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek().is_some_and(|t| &t.token == token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, what: &str) -> Result<(), FormulaError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(FormulaError::new(format!("expected {}", what), self.offset()))
        }
    }

    fn expr(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.term()?;
        loop {
            let op = if self.eat(&Token::Plus) {
                BinaryOp::Add
            } else if self.eat(&Token::Minus) {
                BinaryOp::Sub
            } else {
                return Ok(lhs);
            };
            let rhs = self.term()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn term(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.unary()?;
        loop {
            let op = if self.eat(&Token::Star) {
                BinaryOp::Mul
            } else if self.eat(&Token::Slash) {
                BinaryOp::Div
            } else {
                return Ok(lhs);
            };
            let rhs = self.unary()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn unary(&mut self) -> Result<Expr, FormulaError> {
        if self.eat(&Token::Minus) {
            return Ok(match self.unary()? {
                Expr::Number(n) => Expr::Number(-n),
                inner => Expr::Neg(Box::new(inner)),
            });
        }
        if self.eat(&Token::Plus) {
            return self.unary();
        }
        self.power()
    }

    fn power(&mut self) -> Result<Expr, FormulaError> {
        let base = self.primary()?;
        if self.eat(&Token::Caret) {
            let exponent = self.unary()?;
            return Ok(binary(BinaryOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Expr, FormulaError> {
        let Some(spanned) = self.peek() else {
            return Err(FormulaError::new("unexpected end of formula", self.end));
        };
        self.pos += 1;

        match &spanned.token {
            Token::Number(n) => Ok(Expr::Number(*n)),
            Token::Quoted(name) => Ok(Expr::Name {
                name: name.clone(),
                quoted: true,
            }),
            Token::Dollar(position) => Ok(Expr::Name {
                name: format!("${}", position),
                quoted: false,
            }),
            Token::Ident(name) if self.eat(&Token::LParen) => self.call(name, spanned.offset),
            Token::Ident(name) => Ok(Expr::Name {
                name: name.clone(),
                quoted: false,
            }),
            Token::LParen => {
                let inner = self.expr()?;
                self.expect(&Token::RParen, "`)`")?;
                Ok(inner)
            }
            _ => Err(FormulaError::new("expected a value", spanned.offset)),
        }
    }

    fn call(&mut self, name: &str, offset: usize) -> Result<Expr, FormulaError> {
        let builtin = builtins::lookup(name)
            .ok_or_else(|| FormulaError::new(format!("unknown function `{}`", name), offset))?;

        let mut args = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                args.push(self.expr()?);
                if self.eat(&Token::Comma) {
                    continue;
                }
                self.expect(&Token::RParen, "`,` or `)`")?;
                break;
            }
        }

        if !builtin.arity.accepts(args.len()) {
            return Err(FormulaError::new(
                format!(
                    "`{}` does not take {} argument{}",
                    builtin.name,
                    args.len(),
                    if args.len() == 1 { "" } else { "s" }
                ),
                offset,
            ));
        }

        Ok(Expr::Call {
            function: builtin.function,
            args,
        })
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}
